//! The simulation clock: the sole source of truth for "now".
//!
//! [`SimulationClock`] tracks deterministic *simulation time* in seconds.
//! Simulation time only advances when [`advance`](SimulationClock::advance)
//! is called and the clock is not paused. Wall-clock anchors are carried for
//! optional real-time pacing and diagnostics; they never influence
//! [`now`](SimulationClock::now).

use std::time::{Duration, Instant};

use crate::time::{SimDt, SimTime};

// ---------------------------------------------------------------------------
// SimulationClock
// ---------------------------------------------------------------------------

/// Deterministic simulation clock with advisory wall-clock anchors.
///
/// All operations are total functions over the clock's state: there are no
/// failure paths. The clock does not validate the sign of `dt` passed to
/// [`advance`](Self::advance); the caller owns that contract and the driving
/// loop only ever advances by a fixed positive step.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    /// Current simulation time in seconds.
    sim_time_seconds: SimTime,
    /// While paused, `advance` is a no-op.
    paused: bool,
    /// Wall-clock timepoint of the last `reset`.
    wall_start: Instant,
    /// Wall-clock baseline for periodic pacing checks.
    last_wall_tick: Instant,
}

impl SimulationClock {
    /// Create a clock reset to simulation time 0.0.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            sim_time_seconds: 0.0,
            paused: false,
            wall_start: now,
            last_wall_tick: now,
        }
    }

    /// Reset simulation time to `start_time` seconds, un-pause, and re-anchor
    /// the wall timers.
    ///
    /// Intended at initialization only. Resetting mid-run breaks the time
    /// monotonicity the scheduler relies on.
    pub fn reset(&mut self, start_time: SimTime) {
        self.sim_time_seconds = start_time;
        self.paused = false;
        self.wall_start = Instant::now();
        self.last_wall_tick = self.wall_start;
    }

    // -- simulation-time API ------------------------------------------------

    /// Current simulation time in seconds.
    pub fn now(&self) -> SimTime {
        self.sim_time_seconds
    }

    /// Total elapsed simulation time since reset.
    ///
    /// Identical to [`now`](Self::now) when the clock was reset to 0.0.
    pub fn total_elapsed_sim_time(&self) -> SimTime {
        self.sim_time_seconds
    }

    /// Advance simulation time by `dt` seconds. No effect while paused.
    pub fn advance(&mut self, dt: SimDt) {
        if self.paused {
            return;
        }
        self.sim_time_seconds += dt;
    }

    /// Pause simulation time. While paused, [`advance`](Self::advance) is a
    /// no-op.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume simulation time.
    ///
    /// Re-anchors the wall tick baseline so "elapsed wall since last tick"
    /// does not include the paused span. Missed wall time is not replayed.
    pub fn resume(&mut self) {
        self.paused = false;
        self.last_wall_tick = Instant::now();
    }

    /// Whether simulation time is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // -- wall-clock API (advisory diagnostics only) -------------------------

    /// Wall-clock timepoint when [`reset`](Self::reset) was last called.
    pub fn wall_start_time(&self) -> Instant {
        self.wall_start
    }

    /// Elapsed *wall* time since reset.
    pub fn total_elapsed_wall_time(&self) -> Duration {
        self.wall_start.elapsed()
    }

    /// Elapsed *wall* time since the last wall tick reset.
    pub fn elapsed_wall_time(&self) -> Duration {
        self.last_wall_tick.elapsed()
    }

    /// Reset the wall tick baseline (useful for periodic pacing checks).
    pub fn reset_elapsed_wall_time(&mut self) {
        self.last_wall_tick = Instant::now();
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
