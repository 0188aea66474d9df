//! Physics backend contract
//!
//! [`LinkBackend`] is the seam between a [`Link`](crate::link::Link) and the
//! engine that integrates it. Each engine adapter implements it once; the
//! link layer never touches engine types directly.
//!
//! All vectors crossing this interface are world frame. Force and torque
//! setters act on the pending wrench applied at the next engine step; they
//! never change velocities immediately.

pub mod rapier;

use crate::collision::CollisionSet;
use crate::config::LinkConfig;
use crate::error::Result;
use crate::inertial::Inertial;
use crate::math::{Pose, Real, Vec3};

pub use self::rapier::{RapierBackend, RapierEngine, SharedEngine};

/// Everything a backend needs to build its native body
#[derive(Debug, Clone, Copy)]
pub struct BodyDesc<'a> {
    pub name: &'a str,
    pub pose: Pose,
    /// Link-frame inertial properties
    pub inertial: &'a Inertial,
    pub collisions: &'a CollisionSet,
    pub config: &'a LinkConfig,
}

/// Consistent snapshot of a body's world-frame motion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyKinematics {
    pub pose: Pose,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Default for BodyKinematics {
    fn default() -> Self {
        Self {
            pose: Pose::identity(),
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
        }
    }
}

/// Pose and pending wrench read together, all world frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyWrench {
    pub pose: Pose,
    pub force: Vec3,
    pub torque: Vec3,
}

/// Operations a physics engine adapter provides for one link
pub trait LinkBackend: Send + Sync {
    /// Allocate and activate the native body.
    ///
    /// Fails with `BackendFailure` if a body is already active.
    fn init(&mut self, body: &BodyDesc<'_>) -> Result<()>;

    /// Release the native body; releasing a missing body is `Ok`
    fn fini(&mut self) -> Result<()>;

    /// Whether a native body is currently allocated
    fn is_active(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool) -> Result<()>;
    fn enabled(&self) -> bool;

    fn set_gravity_mode(&mut self, gravity: bool) -> Result<()>;
    fn set_self_collide(&mut self, self_collide: bool) -> Result<()>;
    fn set_auto_disable(&mut self, auto_disable: bool) -> Result<()>;
    fn set_linear_damping(&mut self, damping: Real) -> Result<()>;
    fn set_angular_damping(&mut self, damping: Real) -> Result<()>;

    /// Teleport the body
    fn set_world_pose(&mut self, pose: &Pose) -> Result<()>;
    fn set_linear_vel(&mut self, velocity: &Vec3) -> Result<()>;
    fn set_angular_vel(&mut self, velocity: &Vec3) -> Result<()>;

    /// Replace the pending force
    fn set_force(&mut self, force: &Vec3) -> Result<()>;
    /// Replace the pending torque
    fn set_torque(&mut self, torque: &Vec3) -> Result<()>;
    /// Accumulate into the pending force
    fn add_force(&mut self, force: &Vec3) -> Result<()>;
    /// Accumulate into the pending torque
    fn add_torque(&mut self, torque: &Vec3) -> Result<()>;
    /// Accumulate a force applied at a world point, adding the torque it
    /// induces about the center of mass
    fn add_force_at_world_position(&mut self, force: &Vec3, position: &Vec3) -> Result<()>;

    /// Pending force that the next step will apply
    fn world_force(&self) -> Result<Vec3>;
    /// Pending torque that the next step will apply
    fn world_torque(&self) -> Result<Vec3>;

    /// Pose and velocities read under one lock
    fn kinematics(&self) -> Result<BodyKinematics>;

    /// Pose and pending force/torque read under one lock
    fn wrench(&self) -> Result<BodyWrench>;

    /// Push new link-frame inertial properties
    fn update_mass(&mut self, inertial: &Inertial) -> Result<()>;

    /// Bring native collision geometry in line with `collisions`
    fn update_surface(&mut self, collisions: &CollisionSet) -> Result<()>;

    /// Empty the pending force and torque
    fn clear_wrench(&mut self) -> Result<()>;
}
