//! Declarative link descriptions
//!
//! A description is the structured element tree a link is loaded from:
//! name, pose, an optional inertial override, collision elements and sensor
//! elements. Descriptions are plain serde data and can be read from JSON.

use crate::collision::CollisionShape;
use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::inertial::Inertial;
use crate::layers::CollisionGroups;
use crate::material::SurfaceMaterial;
use crate::math::{checked_pose, pose_from_parts, vec3, Pose, Real};
use rapier3d::na::UnitQuaternion;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Position plus (x, y, z, w) quaternion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseDesc {
    pub position: [Real; 3],
    pub rotation: [Real; 4],
}

impl Default for PoseDesc {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl PoseDesc {
    /// Pose at a position with identity rotation
    pub fn at(x: Real, y: Real, z: Real) -> Self {
        Self {
            position: [x, y, z],
            ..Default::default()
        }
    }

    /// Set rotation from roll, pitch and yaw (radians)
    pub fn with_rotation_euler(mut self, roll: Real, pitch: Real, yaw: Real) -> Self {
        let q = UnitQuaternion::from_euler_angles(roll, pitch, yaw);
        self.rotation = [q.i, q.j, q.k, q.w];
        self
    }

    pub fn to_pose(&self) -> Pose {
        pose_from_parts(self.position, self.rotation)
    }

    fn validate(&self, what: &str) -> Result<()> {
        checked_pose(self.position, self.rotation, what).map(|_| ())
    }
}

/// Explicit inertial element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InertialDesc {
    pub mass: Real,
    /// Center of mass in the owning frame
    #[serde(default)]
    pub com: [Real; 3],
    /// `[ixx, iyy, izz, ixy, ixz, iyz]` about the center of mass
    #[serde(default = "InertialDesc::unit_moments")]
    pub moments: [Real; 6],
}

impl InertialDesc {
    pub fn new(mass: Real) -> Self {
        Self {
            mass,
            com: [0.0; 3],
            moments: Self::unit_moments(),
        }
    }

    fn unit_moments() -> [Real; 6] {
        [1.0, 1.0, 1.0, 0.0, 0.0, 0.0]
    }

    pub fn with_com(mut self, x: Real, y: Real, z: Real) -> Self {
        self.com = [x, y, z];
        self
    }

    pub fn with_moments(mut self, moments: [Real; 6]) -> Self {
        self.moments = moments;
        self
    }

    pub fn to_inertial(&self) -> Result<Inertial> {
        Inertial::from_moments(self.mass, vec3(self.com), self.moments)
    }
}

impl From<&Inertial> for InertialDesc {
    fn from(inertial: &Inertial) -> Self {
        let com = inertial.com();
        Self {
            mass: inertial.mass(),
            com: [com.x, com.y, com.z],
            moments: inertial.moments(),
        }
    }
}

/// Collision element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionDesc {
    pub name: String,
    pub shape: CollisionShape,
    /// Pose relative to the link frame
    #[serde(default)]
    pub pose: PoseDesc,
    #[serde(default)]
    pub surface: SurfaceMaterial,
    #[serde(default)]
    pub groups: CollisionGroups,
    /// Explicit contribution; computed from shape and density when absent
    #[serde(default)]
    pub inertial: Option<InertialDesc>,
}

impl CollisionDesc {
    pub fn new(name: impl Into<String>, shape: CollisionShape) -> Self {
        Self {
            name: name.into(),
            shape,
            pose: PoseDesc::default(),
            surface: SurfaceMaterial::default(),
            groups: CollisionGroups::ALL,
            inertial: None,
        }
    }

    pub fn with_pose(mut self, pose: PoseDesc) -> Self {
        self.pose = pose;
        self
    }

    pub fn with_surface(mut self, surface: SurfaceMaterial) -> Self {
        self.surface = surface;
        self
    }

    pub fn with_groups(mut self, groups: CollisionGroups) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_inertial(mut self, inertial: InertialDesc) -> Self {
        self.inertial = Some(inertial);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(LinkError::InvalidArgument("collision without a name".into()));
        }
        self.pose.validate(&self.name)?;
        self.shape.validate()
    }
}

/// Sensor element; only the name is tracked by the link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorDesc {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl SensorDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: String::new(),
        }
    }
}

/// Description of a whole link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDesc {
    pub name: String,
    #[serde(default)]
    pub pose: PoseDesc,
    /// Explicit inertial override; composed from collisions when absent
    #[serde(default)]
    pub inertial: Option<InertialDesc>,
    #[serde(default)]
    pub collisions: Vec<CollisionDesc>,
    #[serde(default)]
    pub sensors: Vec<SensorDesc>,
    #[serde(flatten)]
    pub config: LinkConfig,
}

impl LinkDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pose: PoseDesc::default(),
            inertial: None,
            collisions: Vec::new(),
            sensors: Vec::new(),
            config: LinkConfig::default(),
        }
    }

    /// Parse and validate a JSON description
    pub fn from_json(text: &str) -> Result<Self> {
        let desc: LinkDesc = serde_json::from_str(text)?;
        desc.validate()?;
        Ok(desc)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_pose(mut self, pose: PoseDesc) -> Self {
        self.pose = pose;
        self
    }

    pub fn with_inertial(mut self, inertial: InertialDesc) -> Self {
        self.inertial = Some(inertial);
        self
    }

    pub fn with_collision(mut self, collision: CollisionDesc) -> Self {
        self.collisions.push(collision);
        self
    }

    pub fn with_sensor(mut self, name: impl Into<String>) -> Self {
        self.sensors.push(SensorDesc::new(name));
        self
    }

    pub fn with_config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Check every element before anything is built from it
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(LinkError::InvalidArgument("link without a name".into()));
        }
        self.pose.validate(&self.name)?;
        self.config.validate()?;
        if let Some(inertial) = &self.inertial {
            inertial.to_inertial()?;
        }

        let mut names = HashSet::new();
        for collision in &self.collisions {
            collision.validate()?;
            if !names.insert(collision.name.as_str()) {
                return Err(LinkError::DuplicateName(collision.name.clone()));
            }
        }
        if self.sensors.iter().any(|s| s.name.is_empty()) {
            return Err(LinkError::InvalidArgument(format!("{}: sensor without a name", self.name)));
        }
        Ok(())
    }
}
