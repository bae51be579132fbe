//! The entity registry: ownership, factories, and the per-tick drain.
//!
//! The [`EntityRegistry`] owns every live entity, keyed by identity. It also
//! maps class-name strings to factory functions so scenarios can construct
//! entities by name, and it moves entity event requests into the scheduler
//! once per tick.
//!
//! The registry is the only code that destroys entities. Lookups hand out
//! shared handles ([`SharedEntity`]), so callers and event callbacks may keep
//! referencing an entity they found, but removal stays the registry's call.
//! Entities request their own removal through the shutdown channel wired at
//! registration; [`sweep_removals`](EntityRegistry::sweep_removals) consumes
//! those signals after each tick.
//!
//! The registry knows nothing about scheduler internals: it only hands over
//! `(absolute_time, callback)` pairs with the delay computed against the
//! clock's "now". The scheduler, in turn, never sees an entity.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, info, warn};

use orrery_core::clock::SimulationClock;
use orrery_core::scheduler::EventScheduler;

use crate::entity::{Entity, ShutdownChannel};
use crate::identity::{EntityId, IdAllocator};
use crate::WorldError;

/// Shared owning handle to a live entity.
///
/// The registry and any code holding a lookup result may reference the same
/// entity concurrently (single-threaded interior mutability); only the
/// registry removes it from the world.
pub type SharedEntity = Rc<RefCell<dyn Entity>>;

/// A zero-argument constructor producing a new entity under a fresh identity.
pub type EntityFactory = Box<dyn Fn(EntityId) -> SharedEntity>;

// ---------------------------------------------------------------------------
// DrainReport
// ---------------------------------------------------------------------------

/// Summary of one [`EntityRegistry::drain_event_requests`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Requests handed to the scheduler.
    pub scheduled: usize,
    /// Requests whose target time had already elapsed; discarded.
    pub discarded: usize,
}

// ---------------------------------------------------------------------------
// EntityRegistry
// ---------------------------------------------------------------------------

/// Owns all live entities and the class-name factory table.
///
/// Entities are kept in a `BTreeMap` so every traversal (ticking, draining)
/// visits them in identity order; together with the scheduler's sequence
/// numbers this keeps whole runs deterministic.
#[derive(Default)]
pub struct EntityRegistry {
    entities: BTreeMap<EntityId, SharedEntity>,
    factories: BTreeMap<String, EntityFactory>,
    ids: IdAllocator,
    removals: ShutdownChannel,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // -- registration -------------------------------------------------------

    /// Take shared ownership of `entity` and insert it into the world.
    ///
    /// The shutdown-notification channel is wired before the entity is
    /// inserted, so no tick can ever observe an unwired entity. Returns the
    /// entity's identity.
    pub fn register(&mut self, entity: SharedEntity) -> EntityId {
        let (id, name) = {
            let mut e = entity.borrow_mut();
            e.wire_shutdown(self.removals.handle());
            (e.id(), e.name().to_owned())
        };
        self.entities.insert(id, entity);
        info!(entity_id = %id, name = %name, "entity registered");
        id
    }

    /// Install a named constructor.
    ///
    /// Class names are stored verbatim; matching is case-sensitive here, and
    /// callers (the scenario loader) normalize by convention.
    pub fn register_factory(&mut self, class_name: impl Into<String>, factory: EntityFactory) {
        self.factories.insert(class_name.into(), factory);
    }

    /// Construct a new entity by class name under a fresh identity.
    ///
    /// Does NOT register the result; registration is a separate, explicit
    /// step. An unknown class name is a reported, non-fatal condition.
    pub fn create_from_class_name(&mut self, class_name: &str) -> Result<SharedEntity, WorldError> {
        let Some(factory) = self.factories.get(class_name) else {
            warn!(class_name, "no factory registered for class name");
            return Err(WorldError::UnknownClass {
                name: class_name.to_owned(),
            });
        };
        let id = self.ids.allocate();
        Ok(factory(id))
    }

    /// Allocate a fresh identity for an externally constructed entity.
    pub fn allocate_id(&mut self) -> EntityId {
        self.ids.allocate()
    }

    // -- removal ------------------------------------------------------------

    /// Erase the entity with `id` from the world. Idempotent: removing an
    /// absent identity is a no-op, not an error. Returns whether an entity
    /// was actually removed.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let removed = self.entities.remove(&id).is_some();
        if removed {
            info!(entity_id = %id, "entity removed");
        }
        removed
    }

    /// Consume pending shutdown notifications and remove those entities.
    ///
    /// Called by the simulation loop after the tick, so entities that signal
    /// their own destruction mid-tick are reaped at a well-defined point.
    /// Returns the number removed.
    pub fn sweep_removals(&mut self) -> usize {
        let mut removed = 0;
        for id in self.removals.drain() {
            if self.remove(id) {
                removed += 1;
            }
        }
        removed
    }

    /// Shut down and drop every live entity (bulk teardown).
    pub fn shutdown_all(&mut self) {
        let count = self.entities.len();
        for entity in self.entities.values() {
            entity.borrow_mut().shutdown();
        }
        // Shutdown notifications for entities we are about to drop wholesale.
        let _ = self.removals.drain();
        self.entities.clear();
        info!(count, "all entities shut down");
    }

    // -- per-tick drain -----------------------------------------------------

    /// Move every entity's queued event requests into the scheduler.
    ///
    /// For each request the delay is computed as `target_time - clock.now()`.
    /// A positive delay is scheduled; anything else has already elapsed and
    /// is discarded with a missed-deadline warning. Outgoing queues are
    /// cleared regardless of outcome. Runs once per tick, before events are
    /// fired.
    pub fn drain_event_requests(
        &mut self,
        scheduler: &mut EventScheduler,
        clock: &SimulationClock,
    ) -> DrainReport {
        let mut report = DrainReport::default();
        for entity in self.entities.values() {
            let requests = entity.borrow_mut().drain_requests();
            for request in requests {
                let now = clock.now();
                let delay = request.target_time - now;
                if delay > 0.0 {
                    debug!(
                        entity_id = %request.entity_id,
                        description = %request.description,
                        now,
                        target_time = request.target_time,
                        delay,
                        "scheduling entity event"
                    );
                    scheduler.schedule(now, delay, request.action);
                    report.scheduled += 1;
                } else {
                    warn!(
                        entity_id = %request.entity_id,
                        description = %request.description,
                        now,
                        target_time = request.target_time,
                        "event requested for past time; skipping"
                    );
                    report.discarded += 1;
                }
            }
        }
        report
    }

    // -- traversal ----------------------------------------------------------

    /// Apply `f` to every live entity, in identity order.
    ///
    /// The id set is snapshotted before iterating, so `f` may trigger entity
    /// removal (an entity shutting itself down during its own tick) without
    /// invalidating the traversal; ids removed mid-walk are skipped.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&mut dyn Entity),
    {
        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        for id in ids {
            if let Some(entity) = self.entities.get(&id) {
                f(&mut *entity.borrow_mut());
            }
        }
    }

    // -- lookups ------------------------------------------------------------

    /// Shared handle to the entity with `id`, if live.
    pub fn find_by_id(&self, id: EntityId) -> Option<SharedEntity> {
        self.entities.get(&id).map(Rc::clone)
    }

    /// Shared handle to the first entity named `name`, if any.
    ///
    /// Linear scan: names are not a second index, which is acceptable at the
    /// expected population sizes.
    pub fn find_by_name(&self, name: &str) -> Option<SharedEntity> {
        self.entities
            .values()
            .find(|entity| entity.borrow().name() == name)
            .map(Rc::clone)
    }

    /// Number of live entities.
    pub fn count(&self) -> usize {
        self.entities.len()
    }

    /// Whether the world is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Identities of all live entities, in increasing order.
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
