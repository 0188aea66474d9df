//! Collision shapes and the ordered collision set owned by a link

use crate::description::CollisionDesc;
use crate::error::{LinkError, Result};
use crate::inertial::Inertial;
use crate::layers::CollisionGroups;
use crate::material::SurfaceMaterial;
use crate::math::{merge_aabbs, Aabb, Pose, Real};
use rapier3d::prelude as rapier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a collision, stable for the collision's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollisionId(pub u32);

impl fmt::Display for CollisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collision#{}", self.0)
    }
}

/// Collision geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CollisionShape {
    /// Sphere with radius
    Sphere {
        radius: Real,
    },
    /// Box with half-extents
    Box {
        half_extents: [Real; 3],
    },
    /// Capsule aligned along Z axis
    Capsule {
        half_height: Real,
        radius: Real,
    },
    /// Cylinder aligned along Y axis
    Cylinder {
        half_height: Real,
        radius: Real,
    },
    /// Cone aligned along Y axis
    Cone {
        half_height: Real,
        radius: Real,
    },
    /// Convex hull from points
    ConvexHull {
        points: Vec<[Real; 3]>,
    },
    /// Triangle mesh
    TriMesh {
        vertices: Vec<[Real; 3]>,
        indices: Vec<[u32; 3]>,
    },
}

impl CollisionShape {
    /// Create a sphere shape
    pub fn sphere(radius: Real) -> Self {
        Self::Sphere { radius }
    }

    /// Create a box shape from half-extents
    pub fn cuboid(hx: Real, hy: Real, hz: Real) -> Self {
        Self::Box {
            half_extents: [hx, hy, hz],
        }
    }

    /// Create a box shape from full size
    pub fn from_size(width: Real, height: Real, depth: Real) -> Self {
        Self::Box {
            half_extents: [width * 0.5, height * 0.5, depth * 0.5],
        }
    }

    /// Create a capsule shape (Z-aligned)
    pub fn capsule(half_height: Real, radius: Real) -> Self {
        Self::Capsule { half_height, radius }
    }

    /// Create a cylinder shape (Y-aligned)
    pub fn cylinder(half_height: Real, radius: Real) -> Self {
        Self::Cylinder { half_height, radius }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let positive = |v: Real| v.is_finite() && v > 0.0;
        let ok = match self {
            Self::Sphere { radius } => positive(*radius),
            Self::Box { half_extents } => half_extents.iter().all(|v| positive(*v)),
            Self::Capsule { half_height, radius }
            | Self::Cylinder { half_height, radius }
            | Self::Cone { half_height, radius } => positive(*half_height) && positive(*radius),
            Self::ConvexHull { points } => points.len() >= 4,
            Self::TriMesh { vertices, indices } => {
                !indices.is_empty()
                    && indices
                        .iter()
                        .flatten()
                        .all(|i| (*i as usize) < vertices.len())
            }
        };
        if ok {
            Ok(())
        } else {
            Err(LinkError::InvalidArgument(format!("degenerate collision shape {self:?}")))
        }
    }

    /// Build the shared geometry used for bounds, mass and the rapier backend
    pub fn to_rapier(&self) -> Result<rapier::SharedShape> {
        self.validate()?;
        let shape = match self {
            Self::Sphere { radius } => rapier::SharedShape::ball(*radius),
            Self::Box { half_extents } => {
                rapier::SharedShape::cuboid(half_extents[0], half_extents[1], half_extents[2])
            }
            Self::Capsule { half_height, radius } => {
                rapier::SharedShape::capsule_z(*half_height, *radius)
            }
            Self::Cylinder { half_height, radius } => {
                rapier::SharedShape::cylinder(*half_height, *radius)
            }
            Self::Cone { half_height, radius } => rapier::SharedShape::cone(*half_height, *radius),
            Self::ConvexHull { points } => {
                let rapier_points: Vec<_> = points
                    .iter()
                    .map(|p| rapier::Point::new(p[0], p[1], p[2]))
                    .collect();
                rapier::SharedShape::convex_hull(&rapier_points).ok_or_else(|| {
                    LinkError::InvalidArgument("convex hull points are degenerate".into())
                })?
            }
            Self::TriMesh { vertices, indices } => {
                let rapier_verts: Vec<_> = vertices
                    .iter()
                    .map(|v| rapier::Point::new(v[0], v[1], v[2]))
                    .collect();
                rapier::SharedShape::trimesh(rapier_verts, indices.clone())
            }
        };
        Ok(shape)
    }
}

/// A named collision geometry attached to a link
#[derive(Clone)]
pub struct Collision {
    id: CollisionId,
    name: String,
    shape: CollisionShape,
    geometry: rapier::SharedShape,
    local_pose: Pose,
    surface: SurfaceMaterial,
    groups: CollisionGroups,
    /// Contribution in the collision frame
    inertial: Inertial,
    explicit_inertial: bool,
}

impl fmt::Debug for Collision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collision")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("local_pose", &self.local_pose)
            .field("groups", &self.groups)
            .field("inertial", &self.inertial)
            .finish_non_exhaustive()
    }
}

impl Collision {
    fn from_desc(id: CollisionId, desc: &CollisionDesc) -> Result<Self> {
        desc.validate()?;
        let geometry = desc.shape.to_rapier()?;
        let (inertial, explicit_inertial) = match &desc.inertial {
            Some(inertial) => (inertial.to_inertial()?, true),
            None => (
                Inertial::from_mass_properties(&geometry.mass_properties(desc.surface.density)),
                false,
            ),
        };

        Ok(Self {
            id,
            name: desc.name.clone(),
            shape: desc.shape.clone(),
            geometry,
            local_pose: desc.pose.to_pose(),
            surface: desc.surface,
            groups: desc.groups,
            inertial,
            explicit_inertial,
        })
    }

    /// Re-apply a description to an existing collision, keeping its id
    pub(crate) fn update_from_desc(&mut self, desc: &CollisionDesc) -> Result<()> {
        *self = Self::from_desc(self.id, desc)?;
        Ok(())
    }

    pub fn id(&self) -> CollisionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &CollisionShape {
        &self.shape
    }

    pub fn geometry(&self) -> &rapier::SharedShape {
        &self.geometry
    }

    /// Pose relative to the owning link
    pub fn local_pose(&self) -> &Pose {
        &self.local_pose
    }

    pub fn set_local_pose(&mut self, pose: Pose) {
        self.local_pose = pose;
    }

    pub fn world_pose(&self, link_pose: &Pose) -> Pose {
        link_pose * self.local_pose
    }

    pub fn surface(&self) -> &SurfaceMaterial {
        &self.surface
    }

    pub fn groups(&self) -> CollisionGroups {
        self.groups
    }

    pub fn set_groups(&mut self, groups: CollisionGroups) {
        self.groups = groups;
    }

    pub fn laser_retro(&self) -> Real {
        self.surface.laser_retro
    }

    pub fn set_laser_retro(&mut self, retro: Real) {
        self.surface.laser_retro = retro;
    }

    /// Own inertial contribution, in the collision frame
    pub fn inertial(&self) -> &Inertial {
        &self.inertial
    }

    /// Whether the contribution came from the description rather than the shape
    pub fn has_explicit_inertial(&self) -> bool {
        self.explicit_inertial
    }

    /// Contribution expressed in the link frame
    pub fn link_inertial(&self) -> Inertial {
        self.inertial.transformed(&self.local_pose)
    }

    /// World-frame bounding box for the given link pose
    pub fn world_aabb(&self, link_pose: &Pose) -> Aabb {
        self.geometry.compute_aabb(&self.world_pose(link_pose))
    }
}

/// Ordered collisions of one link.
///
/// Iteration follows insertion order. Ids are handed out densely and never
/// reused; names are unique within the set.
#[derive(Debug, Clone, Default)]
pub struct CollisionSet {
    collisions: Vec<Collision>,
    next_id: u32,
}

impl CollisionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and append a collision
    pub fn add(&mut self, desc: &CollisionDesc) -> Result<CollisionId> {
        if self.get_by_name(&desc.name).is_some() {
            log::warn!("Rejected duplicate collision name '{}'", desc.name);
            return Err(LinkError::DuplicateName(desc.name.clone()));
        }

        let id = CollisionId(self.next_id);
        let collision = Collision::from_desc(id, desc)?;
        self.next_id += 1;
        self.collisions.push(collision);
        Ok(id)
    }

    /// Remove a collision by name, returning it
    pub fn remove(&mut self, name: &str) -> Option<Collision> {
        let index = self.collisions.iter().position(|c| c.name == name)?;
        Some(self.collisions.remove(index))
    }

    pub fn clear(&mut self) {
        self.collisions.clear();
    }

    /// Lookup by insertion index
    pub fn get(&self, index: usize) -> Option<&Collision> {
        self.collisions.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Collision> {
        self.collisions.iter().find(|c| c.name == name)
    }

    pub fn get_by_name_mut(&mut self, name: &str) -> Option<&mut Collision> {
        self.collisions.iter_mut().find(|c| c.name == name)
    }

    pub fn get_by_id(&self, id: CollisionId) -> Option<&Collision> {
        self.collisions.iter().find(|c| c.id == id)
    }

    pub fn get_by_id_mut(&mut self, id: CollisionId) -> Option<&mut Collision> {
        self.collisions.iter_mut().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collision> {
        self.collisions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Collision> {
        self.collisions.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.collisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collisions.is_empty()
    }

    /// Mass-weighted composition of every contribution, in the link frame
    pub fn composed_inertial(&self) -> Inertial {
        self.collisions.iter().map(Collision::link_inertial).sum()
    }

    /// Union of the world-frame boxes; zero box when empty
    pub fn bounding_box(&self, link_pose: &Pose) -> Aabb {
        merge_aabbs(self.collisions.iter().map(|c| c.world_aabb(link_pose)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{InertialDesc, PoseDesc};
    use approx::assert_relative_eq;
    use rapier3d::na::Point3;

    fn sphere(name: &str, x: Real, mass: Real) -> CollisionDesc {
        CollisionDesc::new(name, CollisionShape::sphere(0.5))
            .with_pose(PoseDesc::at(x, 0.0, 0.0))
            .with_inertial(InertialDesc::new(mass))
    }

    #[test]
    fn test_ids_are_dense_and_stable() {
        let mut set = CollisionSet::new();
        let a = set.add(&sphere("a", 0.0, 1.0)).unwrap();
        let b = set.add(&sphere("b", 1.0, 1.0)).unwrap();
        assert_eq!((a, b), (CollisionId(0), CollisionId(1)));

        set.remove("a");
        let c = set.add(&sphere("c", 2.0, 1.0)).unwrap();
        assert_eq!(c, CollisionId(2));
        assert_eq!(set.get_by_id(b).unwrap().name(), "b");
        assert_eq!(set.get(1).unwrap().name(), "c");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut set = CollisionSet::new();
        set.add(&sphere("a", 0.0, 1.0)).unwrap();
        let err = set.add(&sphere("a", 1.0, 2.0)).unwrap_err();

        assert!(matches!(err, LinkError::DuplicateName(_)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_lookups_return_none() {
        let set = CollisionSet::new();
        assert!(set.get(0).is_none());
        assert!(set.get_by_name("missing").is_none());
        assert!(set.get_by_id(CollisionId(7)).is_none());
    }

    #[test]
    fn test_composed_inertial() {
        let mut set = CollisionSet::new();
        set.add(&sphere("a", 2.0, 1.0)).unwrap();
        set.add(&sphere("b", -1.0, 2.0)).unwrap();

        let total = set.composed_inertial();
        assert_relative_eq!(total.mass(), 3.0);
        assert_relative_eq!(total.com().x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_density_inertial_from_shape() {
        let mut set = CollisionSet::new();
        let desc = CollisionDesc::new("cube", CollisionShape::cuboid(0.5, 0.5, 0.5))
            .with_surface(SurfaceMaterial::default().with_density(2.0));
        set.add(&desc).unwrap();

        let collision = set.get_by_name("cube").unwrap();
        assert!(!collision.has_explicit_inertial());
        assert_relative_eq!(collision.inertial().mass(), 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_bounding_box_union() {
        let mut set = CollisionSet::new();
        set.add(&sphere("a", -1.0, 1.0)).unwrap();
        set.add(&sphere("b", 3.0, 1.0)).unwrap();

        let aabb = set.bounding_box(&Pose::translation(0.0, 0.0, 1.0));
        assert_relative_eq!(aabb.mins, Point3::new(-1.5, -0.5, 0.5), epsilon = 1e-5);
        assert_relative_eq!(aabb.maxs, Point3::new(3.5, 0.5, 1.5), epsilon = 1e-5);
    }
}
