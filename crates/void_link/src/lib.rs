//! Void Link - Engine-agnostic rigid-body links
//!
//! This crate models the links of articulated Void Engine models: their
//! pose, motion, applied forces, inertial properties, collision geometry and
//! joint connectivity, behind one backend contract any physics engine can
//! implement. A Rapier 3D backend is included.
//!
//! # Features
//!
//! - Inertial composition from collision geometry, or explicit overrides
//! - Pending force/torque accumulation consumed once per step
//! - Relative/world frame accessors built on one transform utility
//! - Joint graph bookkeeping through weak, model-owned joints
//! - Static models rigidly following a link
//! - State snapshots, snapshot messages and enabled notifications
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                      Model                        │
//! │   owns joints (Arc)        owns links (Arc)       │
//! └──────────┬────────────────────────┬──────────────┘
//!            │ weak                   │
//!            ▼                        ▼
//!      ┌──────────┐  weak refs  ┌───────────────────┐
//!      │  Joint   │◄────────────│       Link        │
//!      └──────────┘             │ CollisionSet      │
//!                               │ Inertial          │
//!                               │ StaticAttachments │
//!                               └─────────┬─────────┘
//!                                         │ LinkBackend
//!                                         ▼
//!                               ┌───────────────────┐
//!                               │  RapierBackend    │──► RapierEngine
//!                               └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use void_link::prelude::*;
//!
//! let engine = RapierEngine::new(EngineConfig::default()).shared();
//! let mut model = Model::new("pendulum");
//!
//! let desc = LinkDesc::new("bob")
//!     .with_pose(PoseDesc::at(0.0, 0.0, 2.0))
//!     .with_collision(CollisionDesc::new("ball", CollisionShape::sphere(0.1)));
//! let bob = model.create_link(&desc, Box::new(RapierBackend::new(engine.clone())))?;
//! model.init()?;
//!
//! bob.write().add_force(Vec3::new(1.0, 0.0, 0.0))?;
//! let step = engine.write().step();
//! model.step_links(&step)?;
//! ```

pub mod attachment;
pub mod backend;
pub mod collision;
pub mod config;
pub mod description;
pub mod error;
pub mod events;
pub mod inertial;
pub mod joint;
pub mod layers;
pub mod link;
pub mod material;
pub mod math;
pub mod model;
pub mod msgs;
pub mod state;

pub mod prelude {
    //! Common imports for link functionality
    pub use crate::attachment::{SharedStaticModel, StaticModel};
    pub use crate::backend::{BodyDesc, BodyKinematics, BodyWrench, LinkBackend, RapierBackend, RapierEngine, SharedEngine};
    pub use crate::collision::{Collision, CollisionId, CollisionSet, CollisionShape};
    pub use crate::config::{EngineConfig, LinkConfig};
    pub use crate::description::{CollisionDesc, InertialDesc, LinkDesc, PoseDesc, SensorDesc};
    pub use crate::error::{LinkError, Result};
    pub use crate::events::{Connection, Signal};
    pub use crate::inertial::Inertial;
    pub use crate::joint::{Joint, JointId, JointRef, SharedJoint};
    pub use crate::layers::{CollideMode, CollisionGroups};
    pub use crate::link::{Link, LinkId, LinkPhase};
    pub use crate::material::SurfaceMaterial;
    pub use crate::math::{to_local, to_world, Aabb, Pose, Real, Vec3};
    pub use crate::model::{Model, SharedLink};
    pub use crate::msgs::{CollisionMsg, InertialMsg, LinkMsg, PoseMsg};
    pub use crate::state::{LinkState, StepInfo};
}

pub use prelude::*;
