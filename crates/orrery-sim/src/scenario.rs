//! Decoded scenario model.
//!
//! A scenario supplies, at initialization time only, the simulation timestep
//! and the list of entities to create: class name, optional instance name,
//! optional initial pose, and any trigger requests. The kernel consumes these
//! already-decoded values; this module is the thin producer that decodes them
//! from JSON.
//!
//! Class names are normalized to lowercase by the loader here -- the registry
//! itself matches names verbatim.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use orrery_core::time::{SimDt, SimTime};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while loading or validating a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// The scenario file could not be read.
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),

    /// The scenario document is not valid JSON for the expected shape.
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document decoded but violates a semantic constraint.
    #[error("invalid scenario: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// TriggerTime
// ---------------------------------------------------------------------------

/// When a scenario trigger should fire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerTime {
    /// Absolute simulation time in seconds.
    At(SimTime),
    /// Delay in seconds relative to simulation start.
    After(SimDt),
}

impl TriggerTime {
    /// Resolve to an absolute simulation time given the start time.
    pub fn resolve(self, start: SimTime) -> SimTime {
        match self {
            TriggerTime::At(t) => t,
            TriggerTime::After(d) => start + d,
        }
    }

    fn raw_value(self) -> f64 {
        match self {
            TriggerTime::At(t) => t,
            TriggerTime::After(d) => d,
        }
    }
}

// ---------------------------------------------------------------------------
// Specs
// ---------------------------------------------------------------------------

/// A trigger request attached to a scenario entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Human-readable description, logged when the trigger fires.
    pub description: String,
    /// When the trigger fires.
    #[serde(flatten)]
    pub time: TriggerTime,
}

/// Initial pose for entities that carry spatial state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseSpec {
    /// Position, meters.
    pub position: [f64; 3],
    /// Orientation quaternion `[x, y, z, w]`; identity when absent.
    #[serde(default)]
    pub orientation: Option<[f64; 4]>,
}

/// One entity to create at initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    /// Factory class name (matched case-insensitively; normalized here).
    pub class_name: String,
    /// Optional instance name; the model's default name is kept when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Optional initial pose.
    #[serde(default)]
    pub pose: Option<PoseSpec>,
    /// Trigger requests to enqueue at construction.
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,
}

/// A complete decoded scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Fixed simulation timestep, seconds. Must be positive and finite.
    pub timestep: SimDt,
    /// Entities to create.
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
}

impl ScenarioSpec {
    /// Decode a scenario from a JSON string and validate it.
    pub fn from_json_str(text: &str) -> Result<Self, ScenarioError> {
        let mut spec: ScenarioSpec = serde_json::from_str(text)?;
        spec.normalize();
        spec.validate()?;
        Ok(spec)
    }

    /// Load and decode a scenario file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Lowercase every class name (e.g. `"Missile"` vs `"missile"`).
    fn normalize(&mut self) {
        for entity in &mut self.entities {
            entity.class_name = entity.class_name.to_lowercase();
        }
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if !(self.timestep > 0.0 && self.timestep.is_finite()) {
            return Err(ScenarioError::Invalid {
                reason: format!("timestep must be positive and finite, got {}", self.timestep),
            });
        }
        for (index, entity) in self.entities.iter().enumerate() {
            if entity.class_name.is_empty() {
                return Err(ScenarioError::Invalid {
                    reason: format!("entity #{index} has an empty class name"),
                });
            }
            for trigger in &entity.triggers {
                if !trigger.time.raw_value().is_finite() {
                    return Err(ScenarioError::Invalid {
                        reason: format!(
                            "entity #{index} trigger '{}' has a non-finite time",
                            trigger.description
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_scenario_decodes() {
        let spec = ScenarioSpec::from_json_str(r#"{ "timestep": 0.01 }"#).unwrap();
        assert_eq!(spec.timestep, 0.01);
        assert!(spec.entities.is_empty());
    }

    #[test]
    fn full_scenario_decodes() {
        let text = r#"{
            "timestep": 0.001,
            "entities": [
                {
                    "class_name": "Missile",
                    "name": "interceptor-1",
                    "pose": { "position": [0.0, 0.0, 100.0] },
                    "triggers": [
                        { "description": "arm", "after": 2.5 },
                        { "description": "checkpoint", "at": 10.0 }
                    ]
                },
                { "class_name": "waypoint" }
            ]
        }"#;
        let spec = ScenarioSpec::from_json_str(text).unwrap();
        assert_eq!(spec.entities.len(), 2);

        let missile = &spec.entities[0];
        assert_eq!(missile.class_name, "missile", "class names are normalized");
        assert_eq!(missile.name.as_deref(), Some("interceptor-1"));
        assert_eq!(missile.pose.unwrap().position, [0.0, 0.0, 100.0]);
        assert_eq!(missile.triggers[0].time, TriggerTime::After(2.5));
        assert_eq!(missile.triggers[1].time, TriggerTime::At(10.0));
    }

    #[test]
    fn trigger_times_resolve_against_start() {
        assert_eq!(TriggerTime::At(7.0).resolve(0.0), 7.0);
        assert_eq!(TriggerTime::After(7.0).resolve(0.0), 7.0);
        assert_eq!(TriggerTime::At(7.0).resolve(2.0), 7.0);
        assert_eq!(TriggerTime::After(7.0).resolve(2.0), 9.0);
    }

    #[test]
    fn zero_timestep_rejected() {
        let err = ScenarioSpec::from_json_str(r#"{ "timestep": 0.0 }"#).unwrap_err();
        assert!(matches!(err, ScenarioError::Invalid { .. }));
    }

    #[test]
    fn empty_class_name_rejected() {
        let text = r#"{ "timestep": 0.1, "entities": [ { "class_name": "" } ] }"#;
        let err = ScenarioSpec::from_json_str(text).unwrap_err();
        assert!(matches!(err, ScenarioError::Invalid { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = ScenarioSpec::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ScenarioError::Parse(_)));
    }

    #[test]
    fn roundtrip_through_json() {
        let spec = ScenarioSpec {
            timestep: 0.05,
            entities: vec![EntitySpec {
                class_name: "missile".to_owned(),
                name: Some("m1".to_owned()),
                pose: Some(PoseSpec {
                    position: [1.0, 2.0, 3.0],
                    orientation: Some([0.0, 0.0, 0.0, 1.0]),
                }),
                triggers: vec![TriggerSpec {
                    description: "arm".to_owned(),
                    time: TriggerTime::After(1.0),
                }],
            }],
        };
        let json = serde_json::to_string(&spec).unwrap();
        let decoded = ScenarioSpec::from_json_str(&json).unwrap();
        assert_eq!(spec, decoded);
    }
}
