//! Simulation time scalars.
//!
//! Simulation time is a logical clock measured in seconds, advanced only by
//! explicit fixed steps. It is entirely decoupled from wall-clock time: a
//! simulation may run faster or slower than real time without affecting any
//! result.

/// Absolute simulation time in seconds.
pub type SimTime = f64;

/// A simulation time step (delta) in seconds.
pub type SimDt = f64;

/// Smallest meaningful simulation time difference.
///
/// Comparisons tighter than this are below the resolution the framework
/// guarantees for `f64` second timestamps.
pub const EPSILON_TIME: SimTime = 1e-12;
