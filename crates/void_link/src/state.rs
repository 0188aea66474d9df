//! Step markers and kinematic snapshots

use crate::math::{Pose, Real, Vec3};
use serde::{Deserialize, Serialize};

/// What one engine step advanced
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StepInfo {
    /// Simulated time after the step, in seconds
    pub sim_time: f64,
    /// Number of steps taken so far
    pub iterations: u64,
    /// Length of the step that just ran
    pub dt: Real,
}

/// Immutable snapshot of a link's kinematic values at one instant.
///
/// All vectors are world frame. Restoring a snapshot overwrites pose,
/// velocities and accelerations only.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkState {
    name: String,
    sim_time: f64,
    iterations: u64,
    pose: Pose,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    linear_accel: Vec3,
    angular_accel: Vec3,
}

impl LinkState {
    pub(crate) fn new(
        name: impl Into<String>,
        step: &StepInfo,
        pose: Pose,
        linear_velocity: Vec3,
        angular_velocity: Vec3,
        linear_accel: Vec3,
        angular_accel: Vec3,
    ) -> Self {
        Self {
            name: name.into(),
            sim_time: step.sim_time,
            iterations: step.iterations,
            pose,
            linear_velocity,
            angular_velocity,
            linear_accel,
            angular_accel,
        }
    }

    /// Name of the link this snapshot was taken from
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    pub fn linear_accel(&self) -> Vec3 {
        self.linear_accel
    }

    pub fn angular_accel(&self) -> Vec3 {
        self.angular_accel
    }
}
