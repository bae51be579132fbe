//! A fixed point in space with an arrival tolerance.

use glam::DVec3;
use tracing::debug;

use orrery_core::time::{SimDt, SimTime};
use orrery_world::entity::{Entity, EntityCore, EventRequest, ShutdownHandle};
use orrery_world::identity::EntityId;

// ---------------------------------------------------------------------------
// Waypoint
// ---------------------------------------------------------------------------

/// A navigation waypoint. Does nothing on tick; other models test their own
/// position against it with [`is_reached`](Waypoint::is_reached).
pub struct Waypoint {
    core: EntityCore,
    position: DVec3,
    /// Radius within which the waypoint counts as reached, meters.
    tolerance: f64,
}

impl Waypoint {
    /// Create a waypoint at the origin with zero tolerance.
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            core: EntityCore::new(id, name),
            position: DVec3::ZERO,
            tolerance: 0.0,
        }
    }

    /// Place the waypoint and set its arrival tolerance.
    pub fn set_waypoint(&mut self, position: DVec3, tolerance: f64) {
        self.position = position;
        self.tolerance = tolerance;
    }

    /// The waypoint's position.
    pub fn position(&self) -> DVec3 {
        self.position
    }

    /// Whether `target` is within the arrival tolerance.
    pub fn is_reached(&self, target: DVec3) -> bool {
        (target - self.position).length() <= self.tolerance
    }
}

impl Entity for Waypoint {
    fn id(&self) -> EntityId {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn set_name(&mut self, name: &str) {
        self.core.set_name(name);
    }

    fn update(&mut self, _t: SimTime, _dt: SimDt) {
        // Waypoints are static.
    }

    fn shutdown(&mut self) {
        if !self.core.is_shutdown() {
            debug!(entity_id = %self.id(), name = %self.name(), "waypoint shutting down");
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

    fn apply_pose(&mut self, position: [f64; 3], _orientation: Option<[f64; 4]>) {
        self.position = DVec3::from_array(position);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
