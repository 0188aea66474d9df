//! Snapshot messages exchanged with other processes
//!
//! Field layout is kept flat and serde-friendly; transports pick their own
//! encoding. Optional fields on [`LinkMsg`] are only applied when present.

use crate::collision::Collision;
use crate::error::Result;
use crate::inertial::Inertial;
use crate::math::{checked_pose, pose_to_parts, vec3, Pose, Real};
use serde::{Deserialize, Serialize};

/// Position plus (x, y, z, w) orientation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseMsg {
    pub position: [Real; 3],
    pub orientation: [Real; 4],
}

impl From<&Pose> for PoseMsg {
    fn from(pose: &Pose) -> Self {
        let (position, orientation) = pose_to_parts(pose);
        Self {
            position,
            orientation,
        }
    }
}

impl PoseMsg {
    /// Fails with `InvalidArgument` on non-finite values or a zero quaternion
    pub fn to_pose(&self) -> Result<Pose> {
        checked_pose(self.position, self.orientation, "pose message")
    }
}

/// Mass, center of mass and `[ixx, iyy, izz, ixy, ixz, iyz]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InertialMsg {
    pub mass: Real,
    pub com: [Real; 3],
    pub moments: [Real; 6],
}

impl From<&Inertial> for InertialMsg {
    fn from(inertial: &Inertial) -> Self {
        let com = inertial.com();
        Self {
            mass: inertial.mass(),
            com: [com.x, com.y, com.z],
            moments: inertial.moments(),
        }
    }
}

impl InertialMsg {
    pub fn to_inertial(&self) -> Result<Inertial> {
        Inertial::from_moments(self.mass, vec3(self.com), self.moments)
    }
}

/// Per-collision summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionMsg {
    pub id: u32,
    pub name: String,
    /// Pose relative to the link
    pub pose: PoseMsg,
    pub laser_retro: Real,
    pub category_bits: u32,
    pub collide_bits: u32,
}

impl From<&Collision> for CollisionMsg {
    fn from(collision: &Collision) -> Self {
        let groups = collision.groups();
        Self {
            id: collision.id().0,
            name: collision.name().to_string(),
            pose: PoseMsg::from(collision.local_pose()),
            laser_retro: collision.laser_retro(),
            category_bits: groups.memberships,
            collide_bits: groups.filter,
        }
    }
}

/// Link snapshot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkMsg {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<PoseMsg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_collide: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear_damping: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angular_damping: Option<Real>,
    /// World-frame linear velocity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear_velocity: Option<[Real; 3]>,
    /// World-frame angular velocity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angular_velocity: Option<[Real; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inertial: Option<InertialMsg>,
    #[serde(default)]
    pub collisions: Vec<CollisionMsg>,
    #[serde(default)]
    pub sensors: Vec<String>,
}

impl LinkMsg {
    /// Empty message addressed to a link
    pub fn for_link(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
