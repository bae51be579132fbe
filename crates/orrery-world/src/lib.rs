//! Orrery world -- entity contract, identity, and the owning registry.
//!
//! This crate defines what it means to be an entity in an Orrery simulation
//! and who owns them. The [`Entity`](entity::Entity) trait is the capability
//! contract the kernel consumes (tick, shutdown, emit event requests); the
//! [`EntityRegistry`](registry::EntityRegistry) owns every live entity,
//! constructs them by class name through registered factories, and drains
//! their outgoing event requests into the scheduler once per tick.
//!
//! Entities never see the scheduler, and the scheduler never sees entities;
//! the registry is the only place the two meet, and it only passes
//! `(absolute_time, callback)` pairs across.
//!
//! # Quick Start
//!
//! ```
//! use orrery_world::prelude::*;
//! use orrery_core::prelude::*;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! struct Beacon {
//!     core: EntityCore,
//! }
//!
//! impl Entity for Beacon {
//!     fn id(&self) -> EntityId { self.core.id() }
//!     fn name(&self) -> &str { self.core.name() }
//!     fn set_name(&mut self, name: &str) { self.core.set_name(name); }
//!     fn update(&mut self, _t: SimTime, _dt: SimDt) {}
//!     fn shutdown(&mut self) { self.core.signal_shutdown(); }
//!     fn request_event(&mut self, request: EventRequest) { self.core.push_request(request); }
//!     fn drain_requests(&mut self) -> Vec<EventRequest> { self.core.drain_requests() }
//!     fn wire_shutdown(&mut self, handle: ShutdownHandle) { self.core.wire_shutdown(handle); }
//! }
//!
//! let mut registry = EntityRegistry::new();
//! registry.register_factory("beacon", Box::new(|id| -> SharedEntity {
//!     Rc::new(RefCell::new(Beacon { core: EntityCore::new(id, "beacon") }))
//! }));
//!
//! let beacon = registry.create_from_class_name("beacon").unwrap();
//! registry.register(beacon);
//! assert_eq!(registry.count(), 1);
//! ```

#![deny(unsafe_code)]

pub mod entity;
pub mod identity;
pub mod registry;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// No factory is registered under the requested class name.
    #[error("no factory registered for class name '{name}'")]
    UnknownClass {
        /// The class name that failed to resolve.
        name: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::entity::{
        Entity, EntityCore, EventRequest, ShutdownChannel, ShutdownHandle,
    };
    pub use crate::identity::{EntityId, IdAllocator};
    pub use crate::registry::{DrainReport, EntityFactory, EntityRegistry, SharedEntity};
    pub use crate::WorldError;
}
