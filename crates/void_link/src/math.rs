//! Pose and frame helpers
//!
//! Every relative/world accessor on a link goes through [`to_world`] and
//! [`to_local`] so the frame math lives in exactly one place.

use crate::error::{LinkError, Result};
use rapier3d::na::{Isometry3, Matrix3, Point3, Quaternion, Translation3, UnitQuaternion, Vector3};
use rapier3d::parry::bounding_volume::BoundingVolume;

pub use rapier3d::math::Real;
pub use rapier3d::parry::bounding_volume::Aabb;

/// Vector in either a link-local or the world frame
pub type Vec3 = Vector3<Real>;

/// Rigid transform (translation + rotation)
pub type Pose = Isometry3<Real>;

/// 3x3 inertia tensor
pub type Mat3 = Matrix3<Real>;

/// Rotate a link-local vector into the world frame
#[inline]
pub fn to_world(pose: &Pose, local: &Vec3) -> Vec3 {
    pose.rotation * local
}

/// Rotate a world-frame vector into the link-local frame
#[inline]
pub fn to_local(pose: &Pose, world: &Vec3) -> Vec3 {
    pose.rotation.inverse_transform_vector(world)
}

/// Map a link-local position to a world position
#[inline]
pub fn point_to_world(pose: &Pose, local: &Vec3) -> Vec3 {
    pose.transform_point(&Point3::from(*local)).coords
}

/// Build a vector from a plain array
#[inline]
pub fn vec3(v: [Real; 3]) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

/// Flatten a vector into a plain array
#[inline]
pub fn to_array(v: &Vec3) -> [Real; 3] {
    [v.x, v.y, v.z]
}

/// Build a pose from a position and an (x, y, z, w) quaternion
pub fn pose_from_parts(position: [Real; 3], rotation: [Real; 4]) -> Pose {
    let rotation = UnitQuaternion::from_quaternion(Quaternion::new(
        rotation[3],
        rotation[0],
        rotation[1],
        rotation[2],
    ));
    Isometry3::from_parts(Translation3::new(position[0], position[1], position[2]), rotation)
}

/// Like [`pose_from_parts`], but rejects non-finite values and a
/// quaternion too short to normalize
pub fn checked_pose(position: [Real; 3], rotation: [Real; 4], what: &str) -> Result<Pose> {
    let finite = position.iter().chain(rotation.iter()).all(|v| v.is_finite());
    let norm = rotation.iter().map(|v| v * v).sum::<Real>();
    if !finite || norm <= Real::EPSILON {
        return Err(LinkError::InvalidArgument(format!("{what}: malformed pose")));
    }
    Ok(pose_from_parts(position, rotation))
}

/// Split a pose into a position and an (x, y, z, w) quaternion
pub fn pose_to_parts(pose: &Pose) -> ([Real; 3], [Real; 4]) {
    let t = pose.translation.vector;
    let q = pose.rotation;
    ([t.x, t.y, t.z], [q.i, q.j, q.k, q.w])
}

/// Zero-sized box at the origin, returned when there is nothing to bound
pub fn empty_aabb() -> Aabb {
    Aabb::new(Point3::origin(), Point3::origin())
}

/// Union of a sequence of boxes; [`empty_aabb`] when the sequence is empty
pub fn merge_aabbs(boxes: impl IntoIterator<Item = Aabb>) -> Aabb {
    boxes
        .into_iter()
        .reduce(|acc, aabb| acc.merged(&aabb))
        .unwrap_or_else(empty_aabb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frame_round_trip() {
        let pose = Pose::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2));
        let local = Vec3::new(1.0, 0.0, 0.0);

        let world = to_world(&pose, &local);
        assert_relative_eq!(world, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(to_local(&pose, &world), local, epsilon = 1e-6);

        // Positions pick up the translation, directions do not
        assert_relative_eq!(point_to_world(&pose, &local), Vec3::new(1.0, 3.0, 3.0), epsilon = 1e-6);
    }

    #[test]
    fn test_pose_parts() {
        let pose = pose_from_parts([1.0, 0.0, -1.0], [0.0, 0.0, 0.0, 1.0]);
        let (position, rotation) = pose_to_parts(&pose);
        assert_eq!(position, [1.0, 0.0, -1.0]);
        assert_eq!(rotation, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_checked_pose_rejects_degenerate_rotation() {
        assert!(checked_pose([0.0; 3], [0.0; 4], "pose").unwrap_err().is_invalid_argument());
        assert!(checked_pose([Real::NAN, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0], "pose").is_err());
        assert!(checked_pose([0.0; 3], [0.0, 0.0, Real::INFINITY, 1.0], "pose").is_err());

        // Unnormalized quaternions are accepted and normalized
        let pose = checked_pose([0.0; 3], [0.0, 0.0, 0.0, 2.0], "pose").unwrap();
        assert_relative_eq!(pose.rotation.w, 1.0);
    }

    #[test]
    fn test_merge_empty() {
        let aabb = merge_aabbs(std::iter::empty());
        assert_eq!(aabb.mins, Point3::origin());
        assert_eq!(aabb.maxs, Point3::origin());
    }
}
