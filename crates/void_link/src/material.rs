//! Surface materials of collisions

use crate::math::Real;
use serde::{Deserialize, Serialize};

/// Surface properties of a collision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceMaterial {
    /// Friction coefficient (0 = frictionless, 1 = high friction)
    pub friction: Real,
    /// Restitution/bounciness (0 = no bounce, 1 = perfect bounce)
    pub restitution: Real,
    /// Density used when a collision has no explicit inertial (kg/m³)
    pub density: Real,
    /// Laser retro-reflectance reported to ray sensors
    pub laser_retro: Real,
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.0,
            density: 1.0,
            laser_retro: 0.0,
        }
    }
}

impl SurfaceMaterial {
    /// Create a new surface material
    pub fn new(friction: Real, restitution: Real) -> Self {
        Self {
            friction,
            restitution,
            ..Default::default()
        }
    }

    /// Bouncy rubber-like material
    pub fn rubber() -> Self {
        Self {
            friction: 0.8,
            restitution: 0.8,
            density: 1.1,
            ..Default::default()
        }
    }

    /// Metal material
    pub fn metal() -> Self {
        Self {
            friction: 0.3,
            restitution: 0.2,
            density: 7.8,
            laser_retro: 0.9,
        }
    }

    /// Wood material
    pub fn wood() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.3,
            density: 0.6,
            ..Default::default()
        }
    }

    /// Set friction
    pub fn with_friction(mut self, friction: Real) -> Self {
        self.friction = friction.clamp(0.0, 1.0);
        self
    }

    /// Set restitution
    pub fn with_restitution(mut self, restitution: Real) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    /// Set density
    pub fn with_density(mut self, density: Real) -> Self {
        self.density = density.max(0.001);
        self
    }

    /// Set laser retro-reflectance
    pub fn with_laser_retro(mut self, retro: Real) -> Self {
        self.laser_retro = retro;
        self
    }
}
