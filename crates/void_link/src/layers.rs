//! Collision category/collide bit masks and named collide modes

use crate::error::LinkError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category and collide bit masks of a collision.
///
/// Two collisions may touch when each one's category intersects the other's
/// collide mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionGroups {
    /// Which categories this collision belongs to
    pub memberships: u32,
    /// Which categories this collision can collide with
    pub filter: u32,
}

impl CollisionGroups {
    /// Every regular category
    pub const ALL_BITS: u32 = 0x0FFF_FFFF;
    /// Static geometry of the world
    pub const FIXED_BITS: u32 = 0x0000_0001;
    /// Sensor volumes
    pub const SENSOR_BITS: u32 = 0x0000_0002;
    /// Ghost geometry, outside every regular category
    pub const GHOST_BITS: u32 = 0x1000_0000;

    /// Collide with every regular category
    pub const ALL: Self = Self {
        memberships: Self::ALL_BITS,
        filter: Self::ALL_BITS,
    };

    /// Collide with nothing
    pub const NONE: Self = Self {
        memberships: 0,
        filter: 0,
    };

    /// Create new collision groups
    pub fn new(memberships: u32, filter: u32) -> Self {
        Self { memberships, filter }
    }

    /// Check if two groups can collide
    pub fn can_collide(&self, other: &CollisionGroups) -> bool {
        (self.memberships & other.filter) != 0 && (other.memberships & self.filter) != 0
    }

    /// Whether this collision takes part in any contact at all
    pub fn participates(&self) -> bool {
        self.memberships != 0 && self.filter != 0
    }
}

impl Default for CollisionGroups {
    fn default() -> Self {
        Self::ALL
    }
}

/// Named collide mode applied to every collision of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollideMode {
    /// Collide with everything
    All,
    /// Collide with nothing
    None,
    /// Only visible to sensors
    Sensors,
    /// Collide with everything except fixed geometry
    Fixed,
    /// Ignored by regular collisions and by other ghosts
    Ghost,
}

impl CollideMode {
    /// Bit masks this mode assigns to each collision
    pub fn groups(self) -> CollisionGroups {
        match self {
            Self::All => CollisionGroups::ALL,
            Self::None => CollisionGroups::NONE,
            Self::Sensors => CollisionGroups::new(
                CollisionGroups::SENSOR_BITS,
                !CollisionGroups::SENSOR_BITS,
            ),
            Self::Fixed => CollisionGroups::new(
                CollisionGroups::FIXED_BITS,
                !CollisionGroups::FIXED_BITS,
            ),
            Self::Ghost => CollisionGroups::new(
                CollisionGroups::GHOST_BITS,
                !CollisionGroups::GHOST_BITS,
            ),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::None => "none",
            Self::Sensors => "sensors",
            Self::Fixed => "fixed",
            Self::Ghost => "ghost",
        }
    }
}

impl FromStr for CollideMode {
    type Err = LinkError;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        match mode {
            "all" => Ok(Self::All),
            "none" => Ok(Self::None),
            "sensors" | "sensors only" => Ok(Self::Sensors),
            "fixed" => Ok(Self::Fixed),
            "ghost" => Ok(Self::Ghost),
            other => Err(LinkError::InvalidArgument(format!("unknown collide mode '{other}'"))),
        }
    }
}

impl fmt::Display for CollideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_groups() {
        assert!(CollisionGroups::ALL.can_collide(&CollisionGroups::ALL));
        assert!(!CollisionGroups::NONE.can_collide(&CollisionGroups::ALL));
        assert!(!CollisionGroups::NONE.participates());
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("all".parse::<CollideMode>().unwrap(), CollideMode::All);
        assert_eq!("sensors only".parse::<CollideMode>().unwrap(), CollideMode::Sensors);
        assert!("bogus".parse::<CollideMode>().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_fixed_mode_ignores_fixed_geometry() {
        let world = CollisionGroups::new(CollisionGroups::FIXED_BITS, CollisionGroups::ALL_BITS);
        let fixed = CollideMode::Fixed.groups();
        let all = CollideMode::All.groups();

        assert!(!fixed.can_collide(&world));
        assert!(all.can_collide(&world));
    }

    #[test]
    fn test_ghosts_are_ignored() {
        let ghost = CollideMode::Ghost.groups();
        assert!(!ghost.can_collide(&ghost));
        assert!(!ghost.can_collide(&CollideMode::All.groups()));
        assert!(ghost.can_collide(&CollisionGroups::new(u32::MAX, u32::MAX)));
    }
}
