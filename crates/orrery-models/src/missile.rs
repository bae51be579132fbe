//! A self-propelled physics entity.

use glam::{DQuat, DVec3};
use tracing::{debug, info};

use orrery_core::time::{SimDt, SimTime};
use orrery_world::entity::{Entity, EntityCore, EventRequest, ShutdownHandle};
use orrery_world::identity::EntityId;

use crate::kinematics::Kinematics;

// ---------------------------------------------------------------------------
// Missile
// ---------------------------------------------------------------------------

/// A missile: kinematic state integrated every tick.
///
/// Behavior-specific guidance lives above this model; the kernel only sees
/// the [`Entity`] surface.
pub struct Missile {
    core: EntityCore,
    kinematics: Kinematics,
    /// Simulation time of the last once-per-second heartbeat log.
    last_heartbeat: Option<SimTime>,
}

impl Missile {
    /// Create a missile at rest at the origin.
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            core: EntityCore::new(id, name),
            kinematics: Kinematics::default(),
            last_heartbeat: None,
        }
    }

    /// Read access to the kinematic state.
    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    /// Mutable access to the kinematic state.
    pub fn kinematics_mut(&mut self) -> &mut Kinematics {
        &mut self.kinematics
    }
}

impl Entity for Missile {
    fn id(&self) -> EntityId {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn set_name(&mut self, name: &str) {
        self.core.set_name(name);
    }

    fn update(&mut self, t: SimTime, dt: SimDt) {
        // Heartbeat roughly once per simulated second.
        let due = self
            .last_heartbeat
            .map_or(true, |last| t - last >= 1.0 - dt * 0.5);
        if due {
            debug!(
                entity_id = %self.id(),
                name = %self.name(),
                t,
                position = ?self.kinematics.position,
                "missile running"
            );
            self.last_heartbeat = Some(t);
        }

        self.kinematics.integrate(dt);
    }

    fn shutdown(&mut self) {
        if !self.core.is_shutdown() {
            info!(entity_id = %self.id(), name = %self.name(), "missile shutting down");
        }
        self.core.signal_shutdown();
    }

    fn request_event(&mut self, request: EventRequest) {
        self.core.push_request(request);
    }

    fn drain_requests(&mut self) -> Vec<EventRequest> {
        self.core.drain_requests()
    }

    fn wire_shutdown(&mut self, handle: ShutdownHandle) {
        self.core.wire_shutdown(handle);
    }

    fn apply_pose(&mut self, position: [f64; 3], orientation: Option<[f64; 4]>) {
        self.kinematics.position = DVec3::from_array(position);
        if let Some(q) = orientation {
            self.kinematics.orientation = DQuat::from_array(q).normalize();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
