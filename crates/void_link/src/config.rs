//! Per-link physical policy configuration

use crate::error::{LinkError, Result};
use crate::math::Real;
use serde::{Deserialize, Serialize};

/// Physical policy flags applied uniformly to a link.
///
/// Values loaded from a description are cached here; setters on the link
/// update the cache and forward to the backend once it is initialized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Whether gravity acts on this link
    pub gravity: bool,

    /// Whether collisions of this link may collide with each other
    pub self_collide: bool,

    /// Allow the backend to put the body to sleep when it comes to rest
    pub auto_disable: bool,

    /// Linear velocity damping
    pub linear_damping: Real,

    /// Angular velocity damping
    pub angular_damping: Real,

    /// Laser reflectance broadcast to every collision (`None` keeps per-collision values)
    pub laser_retro: Option<Real>,

    /// Whether backend dynamics integration applies at startup
    pub enabled: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            gravity: true,
            self_collide: false,
            auto_disable: true,
            linear_damping: 0.0,
            angular_damping: 0.0,
            laser_retro: None,
            enabled: true,
        }
    }
}

impl LinkConfig {
    /// Configuration for a body that floats and never sleeps
    pub fn floating() -> Self {
        Self {
            gravity: false,
            auto_disable: false,
            ..Default::default()
        }
    }

    /// Set gravity mode
    pub fn with_gravity(mut self, gravity: bool) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set self collision
    pub fn with_self_collide(mut self, self_collide: bool) -> Self {
        self.self_collide = self_collide;
        self
    }

    /// Set auto-disable
    pub fn with_auto_disable(mut self, auto_disable: bool) -> Self {
        self.auto_disable = auto_disable;
        self
    }

    /// Set linear and angular damping
    pub fn with_damping(mut self, linear: Real, angular: Real) -> Self {
        self.linear_damping = linear.max(0.0);
        self.angular_damping = angular.max(0.0);
        self
    }

    /// Set laser retro-reflectance
    pub fn with_laser_retro(mut self, retro: Real) -> Self {
        self.laser_retro = Some(retro);
        self
    }

    /// Set initial enabled state
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Reject damping that is negative or not finite, and a non-finite laser retro
    pub fn validate(&self) -> Result<()> {
        non_negative(self.linear_damping, "linear damping")?;
        non_negative(self.angular_damping, "angular damping")?;
        if let Some(retro) = self.laser_retro {
            finite(retro, "laser retro")?;
        }
        Ok(())
    }
}

pub(crate) fn non_negative(value: Real, what: &str) -> Result<Real> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(LinkError::InvalidArgument(format!("{what} must be >= 0, got {value}")))
    }
}

pub(crate) fn finite(value: Real, what: &str) -> Result<Real> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(LinkError::InvalidArgument(format!("{what} must be finite, got {value}")))
    }
}

/// Configuration of the rapier reference engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Gravity vector (default: -9.81 in Z)
    pub gravity: [Real; 3],

    /// Fixed timestep advanced by every step
    pub timestep: Real,

    /// Solver iterations for velocity
    pub solver_iterations: usize,

    /// Enable continuous collision detection
    pub ccd_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, 0.0, -9.81],
            timestep: 0.001,
            solver_iterations: 4,
            ccd_enabled: false,
        }
    }
}

impl EngineConfig {
    /// Create a configuration for high-precision simulation
    pub fn high_precision() -> Self {
        Self {
            solver_iterations: 8,
            ccd_enabled: true,
            ..Default::default()
        }
    }

    /// Create a configuration for fast simulation (lower quality)
    pub fn fast() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            solver_iterations: 2,
            ..Default::default()
        }
    }

    /// Set gravity
    pub fn with_gravity(mut self, x: Real, y: Real, z: Real) -> Self {
        self.gravity = [x, y, z];
        self
    }

    /// Set timestep
    pub fn with_timestep(mut self, timestep: Real) -> Self {
        self.timestep = timestep;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_damping() {
        assert!(LinkConfig::default().validate().is_ok());

        let mut config = LinkConfig::default();
        config.linear_damping = -5.0;
        assert!(config.validate().unwrap_err().is_invalid_argument());

        let mut config = LinkConfig::default();
        config.angular_damping = Real::NAN;
        assert!(config.validate().is_err());

        // Builders clamp instead of failing
        assert!(LinkConfig::default().with_damping(-1.0, -1.0).validate().is_ok());
    }

    #[test]
    fn test_validate_laser_retro() {
        assert!(LinkConfig::default().with_laser_retro(2000.0).validate().is_ok());
        assert!(LinkConfig::default().with_laser_retro(Real::INFINITY).validate().is_err());
    }

    #[test]
    fn test_engine_presets() {
        let precise = EngineConfig::high_precision();
        assert!(precise.ccd_enabled);
        assert!(precise.solver_iterations > EngineConfig::default().solver_iterations);
        assert!(EngineConfig::fast().timestep > EngineConfig::default().timestep);
    }
}
