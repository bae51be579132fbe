//! Orrery models -- concrete entity types built on the world contract.
//!
//! Models implement the [`Entity`](orrery_world::entity::Entity) trait by
//! embedding an [`EntityCore`](orrery_world::entity::EntityCore) for the
//! bookkeeping half and keeping behavior local. Spatial models attach a
//! [`Kinematics`](kinematics::Kinematics) component; non-spatial models
//! simply do not carry one.

#![deny(unsafe_code)]

pub mod environment;
pub mod kinematics;
pub mod missile;
pub mod waypoint;

use std::cell::RefCell;
use std::rc::Rc;

use orrery_world::registry::{EntityRegistry, SharedEntity};

use crate::missile::Missile;
use crate::waypoint::Waypoint;

/// Install the built-in model factories (`"missile"`, `"waypoint"`).
///
/// Class names are registered lowercase; scenario loading normalizes to
/// lowercase before lookup.
pub fn register_builtin_models(registry: &mut EntityRegistry) {
    registry.register_factory(
        "missile",
        Box::new(|id| -> SharedEntity { Rc::new(RefCell::new(Missile::new(id, "missile"))) }),
    );
    registry.register_factory(
        "waypoint",
        Box::new(|id| -> SharedEntity { Rc::new(RefCell::new(Waypoint::new(id, "waypoint"))) }),
    );
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::environment;
    pub use crate::kinematics::Kinematics;
    pub use crate::missile::Missile;
    pub use crate::waypoint::Waypoint;
    pub use crate::register_builtin_models;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
