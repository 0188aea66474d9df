//! Inertial properties and their composition

use crate::error::{LinkError, Result};
use crate::math::{Mat3, Pose, Real, Vec3};
use rapier3d::na::Point3;
use rapier3d::prelude as rapier;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

const SYMMETRY_TOLERANCE: Real = 1.0e-4;

/// Mass, center of mass and inertia tensor of a rigid body.
///
/// The tensor is expressed about the center of mass, in the axes of the
/// frame the center of mass is given in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inertial {
    mass: Real,
    com: Vec3,
    inertia: Mat3,
}

impl Default for Inertial {
    fn default() -> Self {
        Self::zero()
    }
}

impl Inertial {
    /// Massless body at the origin
    pub fn zero() -> Self {
        Self {
            mass: 0.0,
            com: Vec3::zeros(),
            inertia: Mat3::zeros(),
        }
    }

    /// Create validated inertial properties.
    ///
    /// Mass must be finite and non-negative; the tensor must be symmetric
    /// positive semidefinite.
    pub fn new(mass: Real, com: Vec3, inertia: Mat3) -> Result<Self> {
        if !mass.is_finite() || mass < 0.0 {
            return Err(LinkError::InvalidArgument(format!("mass must be >= 0, got {mass}")));
        }
        if inertia.iter().any(|v| !v.is_finite()) {
            return Err(LinkError::InvalidArgument("inertia tensor is not finite".into()));
        }
        if (inertia - inertia.transpose()).abs().max() > SYMMETRY_TOLERANCE {
            return Err(LinkError::InvalidArgument("inertia tensor is not symmetric".into()));
        }
        let tolerance = SYMMETRY_TOLERANCE * inertia.diagonal().amax().max(1.0);
        let smallest = inertia.symmetric_eigenvalues().min();
        if smallest < -tolerance {
            return Err(LinkError::InvalidArgument(format!(
                "inertia tensor has a negative principal moment {smallest}"
            )));
        }
        Ok(Self { mass, com, inertia })
    }

    /// Create from the six independent tensor entries
    pub fn from_moments(
        mass: Real,
        com: Vec3,
        [ixx, iyy, izz, ixy, ixz, iyz]: [Real; 6],
    ) -> Result<Self> {
        let inertia = Mat3::new(ixx, ixy, ixz, ixy, iyy, iyz, ixz, iyz, izz);
        Self::new(mass, com, inertia)
    }

    /// Convert mass properties computed by the geometry library
    pub fn from_mass_properties(props: &rapier::MassProperties) -> Self {
        Self {
            mass: props.mass(),
            com: props.local_com.coords,
            inertia: props.reconstruct_inertia_matrix(),
        }
    }

    /// Convert into mass properties the rapier backend understands
    pub fn to_mass_properties(&self) -> rapier::MassProperties {
        rapier::MassProperties::with_inertia_matrix(Point3::from(self.com), self.mass, self.inertia)
    }

    pub fn mass(&self) -> Real {
        self.mass
    }

    pub fn com(&self) -> Vec3 {
        self.com
    }

    pub fn inertia(&self) -> Mat3 {
        self.inertia
    }

    /// `[ixx, iyy, izz, ixy, ixz, iyz]`
    pub fn moments(&self) -> [Real; 6] {
        let i = &self.inertia;
        [i[(0, 0)], i[(1, 1)], i[(2, 2)], i[(0, 1)], i[(0, 2)], i[(1, 2)]]
    }

    /// Inverse mass, zero for massless bodies
    pub fn inv_mass(&self) -> Real {
        if self.mass > 0.0 {
            1.0 / self.mass
        } else {
            0.0
        }
    }

    /// Replace the mass, keeping center of mass and tensor
    pub fn set_mass(&mut self, mass: Real) -> Result<()> {
        *self = Self::new(mass, self.com, self.inertia)?;
        Ok(())
    }

    /// Express these properties in the parent frame of `pose`
    pub fn transformed(&self, pose: &Pose) -> Self {
        let rotation = pose.rotation.to_rotation_matrix();
        Self {
            mass: self.mass,
            com: pose.transform_point(&Point3::from(self.com)).coords,
            inertia: rotation.matrix() * self.inertia * rotation.matrix().transpose(),
        }
    }

    /// Tensor about an arbitrary point (parallel axis theorem)
    pub fn inertia_about(&self, point: &Vec3) -> Mat3 {
        let d = self.com - point;
        self.inertia + (Mat3::identity() * d.dot(&d) - d * d.transpose()) * self.mass
    }

    /// Merge any number of contributions, all expressed in the same frame
    pub fn compose<'a>(parts: impl IntoIterator<Item = &'a Inertial>) -> Self {
        parts.into_iter().copied().sum()
    }
}

impl Add for Inertial {
    type Output = Inertial;

    fn add(self, other: Inertial) -> Inertial {
        let mass = self.mass + other.mass;
        if mass <= 0.0 {
            return Inertial {
                mass: 0.0,
                com: Vec3::zeros(),
                inertia: self.inertia + other.inertia,
            };
        }

        let com = (self.com * self.mass + other.com * other.mass) / mass;
        Inertial {
            mass,
            com,
            inertia: self.inertia_about(&com) + other.inertia_about(&com),
        }
    }
}

impl AddAssign for Inertial {
    fn add_assign(&mut self, other: Inertial) {
        *self = *self + other;
    }
}

impl Sum for Inertial {
    fn sum<I: Iterator<Item = Inertial>>(iter: I) -> Self {
        iter.fold(Inertial::zero(), |acc, i| acc + i)
    }
}
