//! Orrery sim -- the orchestration layer of the simulation framework.
//!
//! This crate ties the kernel together: the [`Controller`](controller::Controller)
//! owns the clock, scheduler, and registry and drives the fixed-step loop;
//! the [`scenario`] module decodes the initialization data (timestep plus
//! entity specs) that external producers supply.
//!
//! # Quick Start
//!
//! ```
//! use orrery_sim::prelude::*;
//!
//! let mut controller = Controller::new();
//! orrery_models::register_builtin_models(controller.registry_mut());
//!
//! let scenario = ScenarioSpec::from_json_str(r#"{
//!     "timestep": 0.01,
//!     "entities": [ { "class_name": "missile", "name": "m1" } ]
//! }"#).unwrap();
//!
//! let report = controller.initialize(scenario.timestep, &scenario.entities).unwrap();
//! assert_eq!(report.created, 1);
//!
//! controller.run_for(1.0).unwrap();
//! assert_eq!(controller.state(), SimState::Terminated);
//! ```

#![deny(unsafe_code)]

pub mod controller;
pub mod scenario;

use crate::controller::SimState;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by controller operations.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The timestep is not a positive finite number.
    #[error("timestep must be positive and finite, got {value}")]
    InvalidTimestep {
        /// The rejected value.
        value: f64,
    },

    /// The operation is not legal in the controller's current state.
    #[error("'{operation}' requires state {expected}, but the controller is {actual:?}")]
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state(s) the operation is legal in.
        expected: &'static str,
        /// The state the controller was actually in.
        actual: SimState,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::controller::{ControlHandle, Controller, InitReport, SimState};
    pub use crate::scenario::{
        EntitySpec, PoseSpec, ScenarioError, ScenarioSpec, TriggerSpec, TriggerTime,
    };
    pub use crate::SimError;

    pub use orrery_core::prelude::*;
    pub use orrery_world::prelude::*;
}
