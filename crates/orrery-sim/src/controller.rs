//! The simulation controller: per-tick orchestration and lifecycle.
//!
//! The [`Controller`] ties the clock, the scheduler, and the registry into
//! the fixed-step loop. Each tick, in load-bearing order:
//!
//! 1. Drain entity event requests into the scheduler.
//! 2. Fire every due event at the current simulation time.
//! 3. Apply control commands (pause/resume/terminate requested by events).
//! 4. If running (not paused), tick every live entity.
//! 5. Advance the clock -- regardless of pause, so paused time still elapses
//!    and previously scheduled absolute-time events still eventually fire.
//! 6. Sweep entity self-destruct signals.
//!
//! The loop is strictly single-threaded and cooperative: every operation
//! runs to completion before the next begins, and across ticks time is
//! monotonic.
//!
//! Event callbacks cannot hold a reference to the controller, so runtime
//! control from inside an event goes through a [`ControlHandle`]: the
//! callback enqueues a command, and the loop consumes it at the next
//! well-defined point. This is the same message-passing shape entities use
//! for their own removal.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, error, info};

use orrery_core::clock::SimulationClock;
use orrery_core::scheduler::{EventAction, EventScheduler};
use orrery_core::time::{SimDt, SimTime};
use orrery_world::entity::EventRequest;
use orrery_world::identity::EntityId;
use orrery_world::registry::EntityRegistry;

use crate::scenario::EntitySpec;
use crate::SimError;

// ---------------------------------------------------------------------------
// SimState
// ---------------------------------------------------------------------------

/// Lifecycle state of the controller.
///
/// `Running ⇄ Paused` is reversible any number of times;
/// `ShuttingDown → Terminated` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    /// Created but not yet initialized; no clock reset has happened.
    Uninitialized,
    /// Ticking entities and firing events.
    Running,
    /// Entity ticking suppressed; the clock still advances and due events
    /// still fire.
    Paused,
    /// Teardown in progress.
    ShuttingDown,
    /// Torn down. Terminal.
    Terminated,
}

// ---------------------------------------------------------------------------
// ControlHandle
// ---------------------------------------------------------------------------

/// A runtime control command consumed by the loop after the fire phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlCommand {
    Pause,
    Resume,
    Terminate,
}

/// Cloneable control capability for event callbacks.
///
/// Commands take effect at the next control point in the tick (right after
/// events fire), so a pause event scheduled for time T suppresses entity
/// ticking from the tick that reaches T onward.
#[derive(Clone, Default)]
pub struct ControlHandle {
    queue: Rc<RefCell<VecDeque<ControlCommand>>>,
}

impl ControlHandle {
    /// Request a pause.
    pub fn pause(&self) {
        self.queue.borrow_mut().push_back(ControlCommand::Pause);
    }

    /// Request a resume.
    pub fn resume(&self) {
        self.queue.borrow_mut().push_back(ControlCommand::Resume);
    }

    /// Request termination of the run.
    pub fn terminate(&self) {
        self.queue.borrow_mut().push_back(ControlCommand::Terminate);
    }

    fn drain(&self) -> Vec<ControlCommand> {
        self.queue.borrow_mut().drain(..).collect()
    }
}

// ---------------------------------------------------------------------------
// InitReport
// ---------------------------------------------------------------------------

/// Summary of one [`Controller::initialize`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitReport {
    /// Entities created and registered.
    pub created: usize,
    /// Specs skipped because no factory matched their class name.
    pub failed: usize,
    /// Trigger requests enqueued onto created entities.
    pub triggers: usize,
}

// ---------------------------------------------------------------------------
// UpdateGuard
// ---------------------------------------------------------------------------

/// Names the offending entity and tick if an update panics.
///
/// The panic itself is not caught -- a callback failure is fatal to the run
/// by design -- but the unwind passes this guard, which emits the diagnostic
/// the operator needs.
struct UpdateGuard {
    entity_id: EntityId,
    tick: u64,
}

impl Drop for UpdateGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!(
                entity_id = %self.entity_id,
                tick = self.tick,
                "entity update panicked; run is terminating"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns the clock, scheduler, and registry, and drives the fixed-step loop.
pub struct Controller {
    clock: SimulationClock,
    scheduler: EventScheduler,
    registry: EntityRegistry,
    state: SimState,
    fixed_dt: SimDt,
    tick_counter: u64,
    controls: ControlHandle,
    terminate_requested: bool,
}

impl Controller {
    /// Create an uninitialized controller.
    pub fn new() -> Self {
        Self {
            clock: SimulationClock::new(),
            scheduler: EventScheduler::new(),
            registry: EntityRegistry::new(),
            state: SimState::Uninitialized,
            fixed_dt: 0.0,
            tick_counter: 0,
            controls: ControlHandle::default(),
            terminate_requested: false,
        }
    }

    // -- initialization -----------------------------------------------------

    /// Initialize the run: set the fixed timestep, reset the clock to t=0,
    /// and create, pose, and register one entity per spec.
    ///
    /// Unknown class names are reported and skipped; the run proceeds with
    /// the entities successfully created. Trigger requests are enqueued onto
    /// their entity and reach the scheduler through the first tick's drain.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidTimestep`] for a non-positive or non-finite
    /// timestep; [`SimError::InvalidState`] if already initialized.
    pub fn initialize(
        &mut self,
        timestep: SimDt,
        specs: &[EntitySpec],
    ) -> Result<InitReport, SimError> {
        if self.state != SimState::Uninitialized {
            return Err(SimError::InvalidState {
                operation: "initialize",
                expected: "Uninitialized",
                actual: self.state,
            });
        }
        if !(timestep > 0.0 && timestep.is_finite()) {
            return Err(SimError::InvalidTimestep { value: timestep });
        }

        self.fixed_dt = timestep;
        self.clock.reset(0.0);
        let start = self.clock.now();

        let mut report = InitReport::default();
        for spec in specs {
            let entity = match self.registry.create_from_class_name(&spec.class_name) {
                Ok(entity) => entity,
                Err(_) => {
                    // Already logged by the registry; a configuration error
                    // is non-fatal.
                    report.failed += 1;
                    continue;
                }
            };

            {
                let mut e = entity.borrow_mut();
                if let Some(name) = &spec.name {
                    e.set_name(name);
                }
                if let Some(pose) = spec.pose {
                    e.apply_pose(pose.position, pose.orientation);
                }
                for trigger in &spec.triggers {
                    let target_time = trigger.time.resolve(start);
                    let entity_id = e.id();
                    let description = trigger.description.clone();
                    e.request_event(EventRequest::new(
                        entity_id,
                        target_time,
                        trigger.description.clone(),
                        Box::new(move || {
                            info!(entity_id = %entity_id, description = %description, "scenario trigger fired");
                        }),
                    ));
                    report.triggers += 1;
                }
            }

            self.registry.register(entity);
            report.created += 1;
        }

        self.state = SimState::Running;
        info!(
            timestep,
            created = report.created,
            failed = report.failed,
            triggers = report.triggers,
            "simulation initialized"
        );
        Ok(report)
    }

    // -- per-tick algorithm -------------------------------------------------

    /// Execute one tick. Legal while `Running` or `Paused`.
    pub fn step(&mut self) -> Result<(), SimError> {
        if !matches!(self.state, SimState::Running | SimState::Paused) {
            return Err(SimError::InvalidState {
                operation: "step",
                expected: "Running or Paused",
                actual: self.state,
            });
        }

        // 1) Move entity-requested events into the scheduler.
        self.registry
            .drain_event_requests(&mut self.scheduler, &self.clock);

        // 2) Fire everything due at the current simulation time.
        self.scheduler.fire_due(self.clock.now());

        // 3) Consume control commands issued by event callbacks.
        self.apply_control_commands();

        // 4) Tick entities unless paused.
        if self.state == SimState::Running {
            let t = self.clock.now();
            let dt = self.fixed_dt;
            let tick = self.tick_counter;
            self.registry.for_each(|entity| {
                let _guard = UpdateGuard {
                    entity_id: entity.id(),
                    tick,
                };
                entity.update(t, dt);
            });
        }

        // 5) Advance time, paused or not.
        self.clock.advance(self.fixed_dt);

        // 6) Reap entities that signaled their own destruction this tick.
        self.registry.sweep_removals();

        self.tick_counter += 1;

        // Wall-clock pacing heartbeat, roughly once per wall second.
        if self.clock.elapsed_wall_time() > Duration::from_secs(1) {
            info!(
                sim_time = self.clock.now(),
                dt = self.fixed_dt,
                entities = self.registry.count(),
                tick = self.tick_counter,
                "tick heartbeat"
            );
            self.clock.reset_elapsed_wall_time();
        }

        Ok(())
    }

    /// Step until `predicate` returns true or termination is requested, then
    /// shut down.
    pub fn run_until<P>(&mut self, mut predicate: P) -> Result<(), SimError>
    where
        P: FnMut(&Controller) -> bool,
    {
        while !self.terminate_requested && !predicate(self) {
            self.step()?;
        }
        self.shutdown();
        Ok(())
    }

    /// Run for `sim_seconds` of simulation time, then shut down.
    pub fn run_for(&mut self, sim_seconds: SimTime) -> Result<(), SimError> {
        let limit = self.clock.now() + sim_seconds;
        self.run_until(move |controller| controller.sim_time() >= limit)
    }

    // -- runtime control ----------------------------------------------------

    /// Suppress entity ticking. No-op unless `Running`.
    ///
    /// Only ticking is suppressed: the loop keeps advancing the clock so
    /// paused time still elapses and previously scheduled absolute-time
    /// events still fire. (The clock's own pause flag is a separate,
    /// lower-level capability the loop deliberately does not use.)
    pub fn pause(&mut self) {
        if self.state == SimState::Running {
            self.state = SimState::Paused;
            info!(sim_time = self.clock.now(), "simulation paused");
        }
    }

    /// Resume entity ticking. No-op unless `Paused`.
    pub fn resume(&mut self) {
        if self.state == SimState::Paused {
            self.state = SimState::Running;
            info!(sim_time = self.clock.now(), "simulation resumed");
        }
    }

    /// Flag the run for termination; the loop exits before its next tick.
    pub fn request_termination(&mut self) {
        if !self.terminate_requested {
            self.terminate_requested = true;
            debug!(sim_time = self.clock.now(), "termination requested");
        }
    }

    /// A cloneable handle event callbacks can use to pause, resume, or
    /// terminate the run.
    pub fn control_handle(&self) -> ControlHandle {
        self.controls.clone()
    }

    /// Tear down every entity and enter `Terminated`. Idempotent.
    pub fn shutdown(&mut self) {
        if matches!(self.state, SimState::ShuttingDown | SimState::Terminated) {
            return;
        }
        info!(sim_time = self.clock.now(), "shutting down simulation");
        self.state = SimState::ShuttingDown;
        self.registry.shutdown_all();
        self.state = SimState::Terminated;
        info!("shutdown complete");
    }

    /// Schedule a kernel-level event `delay` seconds from now.
    pub fn schedule_event(&mut self, delay: SimDt, action: EventAction) {
        self.scheduler.schedule(self.clock.now(), delay, action);
    }

    fn apply_control_commands(&mut self) {
        for command in self.controls.drain() {
            match command {
                ControlCommand::Pause => self.pause(),
                ControlCommand::Resume => self.resume(),
                ControlCommand::Terminate => self.request_termination(),
            }
        }
    }

    // -- accessors ----------------------------------------------------------

    /// Current lifecycle state.
    pub fn state(&self) -> SimState {
        self.state
    }

    /// Ticks executed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Current simulation time in seconds.
    pub fn sim_time(&self) -> SimTime {
        self.clock.now()
    }

    /// The fixed timestep in seconds. Zero until initialized.
    pub fn fixed_dt(&self) -> SimDt {
        self.fixed_dt
    }

    /// Read access to the clock.
    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// Read access to the entity registry.
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Mutable access to the entity registry (factory registration, manual
    /// entity setup).
    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    /// Read access to the scheduler.
    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_world::entity::{Entity, EntityCore, ShutdownHandle};
    use orrery_world::registry::SharedEntity;
    use std::cell::Cell;

    /// Test entity: counts updates and records the times it was ticked at.
    struct Probe {
        core: EntityCore,
        updates: Rc<Cell<u32>>,
        tick_times: Rc<RefCell<Vec<SimTime>>>,
        panic_on_update: bool,
    }

    impl Probe {
        fn new(id: EntityId) -> Self {
            Self {
                core: EntityCore::new(id, "probe"),
                updates: Rc::new(Cell::new(0)),
                tick_times: Rc::new(RefCell::new(Vec::new())),
                panic_on_update: false,
            }
        }
    }

    impl Entity for Probe {
        fn id(&self) -> EntityId {
            self.core.id()
        }
        fn name(&self) -> &str {
            self.core.name()
        }
        fn set_name(&mut self, name: &str) {
            self.core.set_name(name);
        }
        fn update(&mut self, t: SimTime, _dt: SimDt) {
            if self.panic_on_update {
                panic!("probe exploded");
            }
            self.updates.set(self.updates.get() + 1);
            self.tick_times.borrow_mut().push(t);
        }
        fn shutdown(&mut self) {
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
    }

    fn initialized_controller(dt: SimDt) -> Controller {
        let mut controller = Controller::new();
        controller.initialize(dt, &[]).unwrap();
        controller
    }

    fn add_probe(controller: &mut Controller) -> (EntityId, Rc<Cell<u32>>, Rc<RefCell<Vec<SimTime>>>) {
        let id = controller.registry_mut().allocate_id();
        let probe = Probe::new(id);
        let updates = Rc::clone(&probe.updates);
        let times = Rc::clone(&probe.tick_times);
        let shared: SharedEntity = Rc::new(RefCell::new(probe));
        controller.registry_mut().register(shared);
        (id, updates, times)
    }

    // -- state machine ------------------------------------------------------

    #[test]
    fn new_controller_is_uninitialized() {
        let controller = Controller::new();
        assert_eq!(controller.state(), SimState::Uninitialized);
        assert_eq!(controller.tick_count(), 0);
    }

    #[test]
    fn initialize_transitions_to_running() {
        let controller = initialized_controller(0.1);
        assert_eq!(controller.state(), SimState::Running);
        assert_eq!(controller.sim_time(), 0.0);
        assert_eq!(controller.fixed_dt(), 0.1);
    }

    #[test]
    fn initialize_twice_is_an_error() {
        let mut controller = initialized_controller(0.1);
        assert!(matches!(
            controller.initialize(0.1, &[]),
            Err(SimError::InvalidState { .. })
        ));
    }

    #[test]
    fn invalid_timestep_rejected() {
        for bad in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            let mut controller = Controller::new();
            assert!(matches!(
                controller.initialize(bad, &[]),
                Err(SimError::InvalidTimestep { .. })
            ));
        }
    }

    #[test]
    fn step_before_initialize_is_an_error() {
        let mut controller = Controller::new();
        assert!(matches!(
            controller.step(),
            Err(SimError::InvalidState { .. })
        ));
    }

    #[test]
    fn shutdown_is_terminal_and_idempotent() {
        let mut controller = initialized_controller(0.1);
        controller.shutdown();
        assert_eq!(controller.state(), SimState::Terminated);
        controller.shutdown();
        assert_eq!(controller.state(), SimState::Terminated);
        assert!(matches!(
            controller.step(),
            Err(SimError::InvalidState { .. })
        ));
    }

    // -- ticking ------------------------------------------------------------

    #[test]
    fn step_advances_time_and_ticks_entities() {
        let mut controller = initialized_controller(0.1);
        let (_, updates, times) = add_probe(&mut controller);

        controller.step().unwrap();
        controller.step().unwrap();
        controller.step().unwrap();

        assert_eq!(controller.tick_count(), 3);
        assert!((controller.sim_time() - 0.3).abs() < 1e-12);
        assert_eq!(updates.get(), 3);
        // Entities see the pre-advance time of each tick.
        let recorded = times.borrow();
        assert!((recorded[0] - 0.0).abs() < 1e-12);
        assert!((recorded[1] - 0.1).abs() < 1e-12);
        assert!((recorded[2] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn pause_suppresses_updates_but_time_elapses() {
        let mut controller = initialized_controller(0.1);
        let (_, updates, _) = add_probe(&mut controller);

        controller.step().unwrap();
        assert_eq!(updates.get(), 1);

        controller.pause();
        assert_eq!(controller.state(), SimState::Paused);
        for _ in 0..5 {
            controller.step().unwrap();
        }
        assert_eq!(updates.get(), 1, "no updates while paused");
        assert!(
            (controller.sim_time() - 0.6).abs() < 1e-9,
            "paused time still elapses"
        );

        controller.resume();
        controller.step().unwrap();
        assert_eq!(updates.get(), 2);
    }

    #[test]
    fn events_fire_during_pause() {
        let mut controller = initialized_controller(0.1);
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        controller.schedule_event(0.25, Box::new(move || flag.set(true)));

        controller.pause();
        for _ in 0..4 {
            controller.step().unwrap();
        }
        assert!(fired.get(), "scheduled event fires inside the paused span");
    }

    #[test]
    fn scheduled_pause_and_resume_take_effect() {
        let mut controller = initialized_controller(0.1);
        let (_, updates, _) = add_probe(&mut controller);

        let controls = controller.control_handle();
        let pause_controls = controls.clone();
        controller.schedule_event(0.5, Box::new(move || pause_controls.pause()));
        let resume_controls = controls;
        controller.schedule_event(1.0, Box::new(move || resume_controls.resume()));

        // 20 ticks of 0.1 s: updates happen on ticks whose time is outside
        // the paused span [0.5, 1.0).
        for _ in 0..20 {
            controller.step().unwrap();
        }
        // Ticks at t=0.0..0.4 (5) + t=1.0..1.9 (10) = 15 updates.
        assert_eq!(updates.get(), 15);
    }

    #[test]
    fn scheduled_termination_stops_run_until() {
        let mut controller = initialized_controller(0.1);
        let controls = controller.control_handle();
        controller.schedule_event(1.0, Box::new(move || controls.terminate()));

        controller.run_until(|_| false).unwrap();
        assert_eq!(controller.state(), SimState::Terminated);
        assert!((controller.sim_time() - 1.1).abs() < 1e-9);
    }

    #[test]
    fn run_for_reaches_the_requested_horizon() {
        let mut controller = initialized_controller(0.1);
        controller.run_for(2.0).unwrap();
        assert!(controller.sim_time() >= 2.0);
        assert!(controller.sim_time() < 2.0 + 0.1 + 1e-9);
        assert_eq!(controller.state(), SimState::Terminated);
    }

    // -- entity event flow --------------------------------------------------

    #[test]
    fn entity_request_drains_then_fires_exactly_once() {
        let mut controller = initialized_controller(0.1);
        let (id, _, _) = add_probe(&mut controller);

        let fire_count = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&fire_count);
        let probe = controller.registry().find_by_id(id).unwrap();
        probe.borrow_mut().request_event(EventRequest::new(
            id,
            0.5,
            "probe event",
            Box::new(move || counter.set(counter.get() + 1)),
        ));

        // First step drains the request into the scheduler.
        controller.step().unwrap();
        assert!(probe.borrow_mut().drain_requests().is_empty());
        assert_eq!(controller.scheduler().len(), 1);

        for _ in 0..10 {
            controller.step().unwrap();
        }
        assert_eq!(fire_count.get(), 1);
        assert!(controller.scheduler().is_empty());
    }

    #[test]
    fn past_due_request_is_discarded_not_scheduled() {
        let mut controller = initialized_controller(0.1);
        let (id, _, _) = add_probe(&mut controller);

        // Advance past t=1.0 first.
        for _ in 0..15 {
            controller.step().unwrap();
        }

        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let probe = controller.registry().find_by_id(id).unwrap();
        probe.borrow_mut().request_event(EventRequest::new(
            id,
            1.0,
            "stale",
            Box::new(move || flag.set(true)),
        ));

        let before = controller.scheduler().len();
        controller.step().unwrap();
        assert_eq!(controller.scheduler().len(), before, "nothing was scheduled");
        for _ in 0..10 {
            controller.step().unwrap();
        }
        assert!(!fired.get());
    }

    #[test]
    fn entity_self_destruct_from_event_callback() {
        let mut controller = initialized_controller(0.1);
        let (id, _, _) = add_probe(&mut controller);

        let probe = controller.registry().find_by_id(id).unwrap();
        let doomed = Rc::clone(&probe);
        probe.borrow_mut().request_event(EventRequest::new(
            id,
            0.5,
            "self destruct",
            Box::new(move || doomed.borrow_mut().shutdown()),
        ));

        for _ in 0..10 {
            controller.step().unwrap();
        }
        assert_eq!(controller.registry().count(), 0);
        assert!(controller.registry().find_by_id(id).is_none());
    }

    // -- failure semantics --------------------------------------------------

    #[test]
    #[should_panic(expected = "probe exploded")]
    fn entity_update_panic_propagates() {
        let mut controller = initialized_controller(0.1);
        let id = controller.registry_mut().allocate_id();
        let mut probe = Probe::new(id);
        probe.panic_on_update = true;
        let shared: SharedEntity = Rc::new(RefCell::new(probe));
        controller.registry_mut().register(shared);

        let _ = controller.step();
    }
}
