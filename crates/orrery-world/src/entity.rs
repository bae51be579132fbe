//! The entity capability contract and its reusable bookkeeping half.
//!
//! Anything the kernel manages must be tickable and event-emitting: the
//! [`Entity`] trait is that contract. Concrete models implement behavior;
//! the kernel only ever calls the trait surface. Entities never see the
//! scheduler -- they emit [`EventRequest`]s into an outgoing queue that the
//! registry drains once per tick.
//!
//! Lifecycle notification is message passing, not a back-reference: at
//! registration the registry wires each entity with a [`ShutdownHandle`]
//! over a shared removal queue. An entity that shuts itself down (from its
//! own `update` or from an event callback) pushes its id onto that queue;
//! the registry consumes the queue after the tick. No entity ever holds a
//! live handle into its owner.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use orrery_core::scheduler::EventAction;
use orrery_core::time::{SimDt, SimTime};

use crate::identity::EntityId;

// ---------------------------------------------------------------------------
// EventRequest
// ---------------------------------------------------------------------------

/// An entity-originated, not-yet-scheduled intent to fire a callback at a
/// future absolute simulation time.
///
/// `target_time` is always ABSOLUTE simulation time in seconds, never a
/// relative delay. The request sits in its entity's outgoing queue until the
/// registry drains it; ownership then transfers to the scheduler.
pub struct EventRequest {
    /// Identity of the requesting entity.
    pub entity_id: EntityId,
    /// Absolute simulation time (seconds) at which the callback should fire.
    pub target_time: SimTime,
    /// Human-readable description, for diagnostics.
    pub description: String,
    /// The callback to fire.
    pub action: EventAction,
}

impl EventRequest {
    /// Build a request for `entity_id` at absolute time `target_time`.
    pub fn new(
        entity_id: EntityId,
        target_time: SimTime,
        description: impl Into<String>,
        action: EventAction,
    ) -> Self {
        Self {
            entity_id,
            target_time,
            description: description.into(),
            action,
        }
    }
}

impl fmt::Debug for EventRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRequest")
            .field("entity_id", &self.entity_id)
            .field("target_time", &self.target_time)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ShutdownChannel / ShutdownHandle
// ---------------------------------------------------------------------------

/// The registry's end of the lifecycle notification channel.
///
/// Holds the shared removal queue. Entities get cloned [`ShutdownHandle`]s
/// at registration; the registry drains the queue after each tick.
#[derive(Default)]
pub struct ShutdownChannel {
    queue: Rc<RefCell<VecDeque<EntityId>>>,
}

impl ShutdownChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cloneable notification handle for one entity side of the channel.
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            queue: Rc::clone(&self.queue),
        }
    }

    /// Take every pending removal notification, in arrival order.
    pub fn drain(&self) -> Vec<EntityId> {
        self.queue.borrow_mut().drain(..).collect()
    }

    /// Whether any notifications are pending.
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

/// The entity's end of the lifecycle notification channel.
#[derive(Clone)]
pub struct ShutdownHandle {
    queue: Rc<RefCell<VecDeque<EntityId>>>,
}

impl ShutdownHandle {
    /// Signal that the entity with `id` wants to be removed from the world.
    pub fn notify(&self, id: EntityId) {
        self.queue.borrow_mut().push_back(id);
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// The capability contract every managed entity satisfies toward the kernel.
pub trait Entity {
    /// Stable identity, assigned once at construction and never mutated.
    fn id(&self) -> EntityId;

    /// Human-readable instance name.
    fn name(&self) -> &str;

    /// Rename the entity (scenario loading names instances after creation).
    fn set_name(&mut self, name: &str);

    /// Advance the entity by one step. Invoked once per unpaused tick.
    ///
    /// May enqueue [`EventRequest`]s and/or signal the entity's own shutdown.
    /// Must not block.
    fn update(&mut self, t: SimTime, dt: SimDt);

    /// Begin teardown. Idempotent: at most one removal notification is ever
    /// emitted, and pending event requests the entity no longer intends to
    /// honor are flushed.
    fn shutdown(&mut self);

    /// Queue an outgoing event request for the registry to drain.
    fn request_event(&mut self, request: EventRequest);

    /// Empty and return the outgoing request queue.
    fn drain_requests(&mut self) -> Vec<EventRequest>;

    /// Install the removal-notification handle. Called by the registry
    /// before the entity is observable by any tick.
    fn wire_shutdown(&mut self, handle: ShutdownHandle);

    /// Apply an initial pose, for entities that carry spatial state.
    ///
    /// Optional capability: the default implementation ignores the pose.
    /// `orientation` is an `[x, y, z, w]` quaternion.
    fn apply_pose(&mut self, _position: [f64; 3], _orientation: Option<[f64; 4]>) {}
}

// ---------------------------------------------------------------------------
// EntityCore
// ---------------------------------------------------------------------------

/// The bookkeeping half of the [`Entity`] contract, for embedding.
///
/// Concrete models hold an `EntityCore` and delegate identity, naming, the
/// outgoing queue, and shutdown signalling to it, keeping their own code to
/// behavior. Composition replaces the base-class inheritance of a classic
/// entity hierarchy.
pub struct EntityCore {
    id: EntityId,
    name: String,
    outgoing: Vec<EventRequest>,
    shutdown_handle: Option<ShutdownHandle>,
    shutdown_signaled: bool,
}

impl EntityCore {
    /// Create bookkeeping state for an entity with `id` and `name`.
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            outgoing: Vec::new(),
            shutdown_handle: None,
            shutdown_signaled: false,
        }
    }

    /// The entity's identity.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The entity's instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the entity.
    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_owned();
    }

    /// Queue an outgoing event request.
    pub fn push_request(&mut self, request: EventRequest) {
        self.outgoing.push(request);
    }

    /// Empty and return the outgoing queue.
    pub fn drain_requests(&mut self) -> Vec<EventRequest> {
        std::mem::take(&mut self.outgoing)
    }

    /// Number of queued outgoing requests.
    pub fn pending_requests(&self) -> usize {
        self.outgoing.len()
    }

    /// Install the removal-notification handle.
    pub fn wire_shutdown(&mut self, handle: ShutdownHandle) {
        self.shutdown_handle = Some(handle);
    }

    /// Flush pending requests and emit the removal notification, exactly
    /// once. Later calls are no-ops.
    pub fn signal_shutdown(&mut self) {
        if self.shutdown_signaled {
            return;
        }
        self.shutdown_signaled = true;
        self.outgoing.clear();
        if let Some(handle) = &self.shutdown_handle {
            handle.notify(self.id);
        }
    }

    /// Whether shutdown has been signaled.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_signaled
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
