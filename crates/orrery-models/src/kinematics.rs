//! Rigid-body kinematic state with explicit Euler integration.
//!
//! [`Kinematics`] is an attached component, not a base class: models that
//! move carry one and call [`integrate`](Kinematics::integrate) from their
//! `update`; models that do not move simply do not have one. This keeps
//! physics fields off non-physics entities.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use orrery_core::time::SimDt;

// ---------------------------------------------------------------------------
// Kinematics
// ---------------------------------------------------------------------------

/// Translational and rotational state of a rigid body.
///
/// `acceleration` and `angular_acceleration` are standing contributions
/// (e.g. gravity); forces and torques accumulated during a step add on top
/// and are cleared by [`integrate`](Self::integrate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    /// Position in world space, meters.
    pub position: DVec3,
    /// Linear velocity, m/s.
    pub velocity: DVec3,
    /// Standing linear acceleration, m/s^2.
    pub acceleration: DVec3,
    /// Orientation as a unit quaternion.
    pub orientation: DQuat,
    /// Angular velocity, rad/s (world axes).
    pub angular_velocity: DVec3,
    /// Standing angular acceleration, rad/s^2.
    pub angular_acceleration: DVec3,
    /// Mass, kg.
    pub mass: f64,
    /// Diagonal inertia tensor, kg*m^2.
    pub inertia: DVec3,
    /// Forces accumulated since the last integration step, N.
    pub force_accumulator: DVec3,
    /// Torques accumulated since the last integration step, N*m.
    pub torque_accumulator: DVec3,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            velocity: DVec3::ZERO,
            acceleration: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
            angular_velocity: DVec3::ZERO,
            angular_acceleration: DVec3::ZERO,
            mass: 1.0,
            inertia: DVec3::ONE,
            force_accumulator: DVec3::ZERO,
            torque_accumulator: DVec3::ZERO,
        }
    }
}

impl Kinematics {
    /// State at rest at `position`.
    pub fn at_position(position: DVec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Accumulate a force for the next integration step.
    pub fn apply_force(&mut self, force: DVec3) {
        self.force_accumulator += force;
    }

    /// Accumulate a torque for the next integration step.
    pub fn apply_torque(&mut self, torque: DVec3) {
        self.torque_accumulator += torque;
    }

    /// Advance the state by `dt` seconds with one explicit Euler step.
    ///
    /// Accumulated forces and torques contribute for this step only and are
    /// cleared afterward.
    pub fn integrate(&mut self, dt: SimDt) {
        let linear = self.acceleration + self.force_accumulator / self.mass;
        self.velocity += linear * dt;
        self.position += self.velocity * dt;

        let angular = self.angular_acceleration + self.torque_accumulator / self.inertia;
        self.angular_velocity += angular * dt;

        // dq/dt = 0.5 * omega * q, then renormalize to stay a unit quaternion.
        let omega = DQuat::from_xyzw(
            self.angular_velocity.x,
            self.angular_velocity.y,
            self.angular_velocity.z,
            0.0,
        );
        self.orientation = (self.orientation + omega * self.orientation * (0.5 * dt)).normalize();

        self.force_accumulator = DVec3::ZERO;
        self.torque_accumulator = DVec3::ZERO;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
