//! Rapier 3D reference backend
//!
//! A [`RapierEngine`] owns the simulation sets and the pipeline; any number of
//! [`RapierBackend`]s share it through a [`SharedEngine`] handle, each one
//! driving exactly one rigid body. User forces set through a backend persist
//! across steps until the owning link clears them.

use super::{BodyDesc, BodyKinematics, BodyWrench, LinkBackend};
use crate::collision::{Collision, CollisionId, CollisionSet};
use crate::config::EngineConfig;
use crate::error::{LinkError, Result};
use crate::inertial::Inertial;
use crate::layers::CollisionGroups;
use crate::math::{Pose, Real, Vec3};
use crate::state::StepInfo;
use parking_lot::RwLock;
use rapier3d::prelude as rapier;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Engine handle shared by every backend of one simulation
pub type SharedEngine = Arc<RwLock<RapierEngine>>;

/// Rapier simulation state
pub struct RapierEngine {
    /// Configuration
    config: EngineConfig,

    /// Rapier physics pipeline
    pipeline: rapier::PhysicsPipeline,

    /// Gravity
    gravity: rapier::Vector<Real>,

    /// Integration parameters
    integration_params: rapier::IntegrationParameters,

    /// Island manager
    islands: rapier::IslandManager,

    /// Broad phase
    broad_phase: rapier::DefaultBroadPhase,

    /// Narrow phase
    narrow_phase: rapier::NarrowPhase,

    /// Impulse joint set
    impulse_joints: rapier::ImpulseJointSet,

    /// Multibody joint set
    multibody_joints: rapier::MultibodyJointSet,

    /// CCD solver
    ccd_solver: rapier::CCDSolver,

    /// Rigid body set
    bodies: rapier::RigidBodySet,

    /// Collider set
    colliders: rapier::ColliderSet,

    /// Simulated seconds
    sim_time: f64,

    /// Steps taken
    iterations: u64,
}

impl RapierEngine {
    /// Create a new engine
    pub fn new(config: EngineConfig) -> Self {
        let gravity = rapier::Vector::new(config.gravity[0], config.gravity[1], config.gravity[2]);

        let mut integration_params = rapier::IntegrationParameters::default();
        integration_params.dt = config.timestep;
        integration_params.num_solver_iterations =
            NonZeroUsize::new(config.solver_iterations).unwrap_or(NonZeroUsize::MIN);

        Self {
            config,
            pipeline: rapier::PhysicsPipeline::new(),
            gravity,
            integration_params,
            islands: rapier::IslandManager::new(),
            broad_phase: rapier::DefaultBroadPhase::new(),
            narrow_phase: rapier::NarrowPhase::new(),
            impulse_joints: rapier::ImpulseJointSet::new(),
            multibody_joints: rapier::MultibodyJointSet::new(),
            ccd_solver: rapier::CCDSolver::new(),
            bodies: rapier::RigidBodySet::new(),
            colliders: rapier::ColliderSet::new(),
            sim_time: 0.0,
            iterations: 0,
        }
    }

    /// Wrap into the shared form backends hold
    pub fn shared(self) -> SharedEngine {
        Arc::new(RwLock::new(self))
    }

    /// Get the engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Set gravity
    pub fn set_gravity(&mut self, x: Real, y: Real, z: Real) {
        self.gravity = rapier::Vector::new(x, y, z);
    }

    /// Get gravity
    pub fn gravity(&self) -> [Real; 3] {
        [self.gravity.x, self.gravity.y, self.gravity.z]
    }

    /// Advance one fixed timestep
    pub fn step(&mut self) -> StepInfo {
        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );

        self.iterations += 1;
        self.sim_time += f64::from(self.integration_params.dt);
        self.step_info()
    }

    /// Marker for the most recent step
    pub fn step_info(&self) -> StepInfo {
        StepInfo {
            sim_time: self.sim_time,
            iterations: self.iterations,
            dt: self.integration_params.dt,
        }
    }

    /// Get number of bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Get number of colliders
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Get number of active (awake) bodies
    pub fn active_body_count(&self) -> usize {
        self.islands.active_dynamic_bodies().len()
    }

    fn insert_body(&mut self, desc: &BodyDesc<'_>) -> (rapier::RigidBodyHandle, Vec<(CollisionId, rapier::ColliderHandle)>) {
        let config = desc.config;
        let body = rapier::RigidBodyBuilder::dynamic()
            .position(desc.pose)
            .gravity_scale(gravity_scale(config.gravity))
            .linear_damping(config.linear_damping)
            .angular_damping(config.angular_damping)
            .can_sleep(config.auto_disable)
            .ccd_enabled(self.config.ccd_enabled)
            .enabled(config.enabled)
            .additional_mass_properties(desc.inertial.to_mass_properties())
            .build();
        let handle = self.bodies.insert(body);

        let colliders = desc
            .collisions
            .iter()
            .map(|collision| (collision.id(), self.insert_collider(handle, collision)))
            .collect();
        (handle, colliders)
    }

    fn insert_collider(&mut self, body: rapier::RigidBodyHandle, collision: &Collision) -> rapier::ColliderHandle {
        let surface = collision.surface();
        // Mass comes from the link inertial only
        let collider = rapier::ColliderBuilder::new(collision.geometry().clone())
            .position(*collision.local_pose())
            .density(0.0)
            .friction(surface.friction)
            .restitution(surface.restitution)
            .collision_groups(interaction_groups(collision.groups()))
            .user_data(u128::from(collision.id().0))
            .build();
        self.colliders.insert_with_parent(collider, body, &mut self.bodies)
    }

    fn refresh_collider(&mut self, handle: rapier::ColliderHandle, collision: &Collision) -> bool {
        let Some(collider) = self.colliders.get_mut(handle) else {
            return false;
        };
        let surface = collision.surface();
        collider.set_shape(collision.geometry().clone());
        collider.set_position_wrt_parent(*collision.local_pose());
        collider.set_friction(surface.friction);
        collider.set_restitution(surface.restitution);
        collider.set_collision_groups(interaction_groups(collision.groups()));
        true
    }

    fn remove_collider(&mut self, handle: rapier::ColliderHandle) {
        self.colliders
            .remove(handle, &mut self.islands, &mut self.bodies, true);
    }

    fn remove_body(&mut self, handle: rapier::RigidBodyHandle) -> bool {
        self.bodies
            .remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true, // Remove attached colliders
            )
            .is_some()
    }
}

impl Default for RapierEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for RapierEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RapierEngine")
            .field("bodies", &self.bodies.len())
            .field("colliders", &self.colliders.len())
            .field("sim_time", &self.sim_time)
            .field("iterations", &self.iterations)
            .finish()
    }
}

fn gravity_scale(gravity: bool) -> Real {
    if gravity {
        1.0
    } else {
        0.0
    }
}

fn interaction_groups(groups: CollisionGroups) -> rapier::InteractionGroups {
    rapier::InteractionGroups::new(
        rapier::Group::from_bits_truncate(groups.memberships),
        rapier::Group::from_bits_truncate(groups.filter),
    )
}

/// One link's body inside a shared [`RapierEngine`]
#[derive(Debug)]
pub struct RapierBackend {
    engine: SharedEngine,
    body: Option<rapier::RigidBodyHandle>,
    colliders: Vec<(CollisionId, rapier::ColliderHandle)>,
    enabled: bool,
    self_collide: bool,
}

impl RapierBackend {
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
            body: None,
            colliders: Vec::new(),
            enabled: false,
            self_collide: false,
        }
    }

    /// Engine this backend lives in
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Native body handle, while allocated
    pub fn body_handle(&self) -> Option<rapier::RigidBodyHandle> {
        self.body
    }

    /// Cached self-collide flag.
    ///
    /// Colliders sharing a body never touch in rapier, so the flag only
    /// matters to engines that model link-to-link filtering.
    pub fn self_collide(&self) -> bool {
        self.self_collide
    }

    fn handle(&self) -> Result<rapier::RigidBodyHandle> {
        self.body
            .ok_or_else(|| LinkError::BackendFailure("no rapier body allocated".into()))
    }

    fn with_body<T>(&self, f: impl FnOnce(&rapier::RigidBody) -> T) -> Result<T> {
        let handle = self.handle()?;
        let engine = self.engine.read();
        engine
            .bodies
            .get(handle)
            .map(f)
            .ok_or_else(|| missing_body(handle))
    }

    fn with_body_mut<T>(&mut self, f: impl FnOnce(&mut rapier::RigidBody) -> T) -> Result<T> {
        let handle = self.handle()?;
        let mut engine = self.engine.write();
        engine
            .bodies
            .get_mut(handle)
            .map(f)
            .ok_or_else(|| missing_body(handle))
    }
}

fn missing_body(handle: rapier::RigidBodyHandle) -> LinkError {
    LinkError::BackendFailure(format!("rapier body {handle:?} no longer exists"))
}

impl LinkBackend for RapierBackend {
    fn init(&mut self, body: &BodyDesc<'_>) -> Result<()> {
        if let Some(handle) = self.body {
            return Err(LinkError::BackendFailure(format!(
                "{}: rapier body {handle:?} is already allocated",
                body.name
            )));
        }

        let (handle, colliders) = self.engine.write().insert_body(body);
        log::debug!(
            "Allocated rapier body {handle:?} for link '{}' with {} colliders",
            body.name,
            colliders.len()
        );
        self.body = Some(handle);
        self.colliders = colliders;
        self.enabled = body.config.enabled;
        self.self_collide = body.config.self_collide;
        Ok(())
    }

    fn fini(&mut self) -> Result<()> {
        let Some(handle) = self.body.take() else {
            return Ok(());
        };
        self.colliders.clear();
        if self.engine.write().remove_body(handle) {
            log::debug!("Released rapier body {handle:?}");
        } else {
            log::warn!("Rapier body {handle:?} was already gone at release");
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.body.is_some()
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.with_body_mut(|body| body.set_enabled(enabled))?;
        self.enabled = enabled;
        Ok(())
    }

    fn enabled(&self) -> bool {
        self.with_body(|body| body.is_enabled()).unwrap_or(self.enabled)
    }

    fn set_gravity_mode(&mut self, gravity: bool) -> Result<()> {
        self.with_body_mut(|body| body.set_gravity_scale(gravity_scale(gravity), true))
    }

    fn set_self_collide(&mut self, self_collide: bool) -> Result<()> {
        self.handle()?;
        self.self_collide = self_collide;
        Ok(())
    }

    fn set_auto_disable(&mut self, auto_disable: bool) -> Result<()> {
        self.with_body_mut(|body| {
            let activation = body.activation_mut();
            if auto_disable {
                activation.normalized_linear_threshold =
                    rapier::RigidBodyActivation::default_normalized_linear_threshold();
                activation.angular_threshold = rapier::RigidBodyActivation::default_angular_threshold();
            } else {
                activation.normalized_linear_threshold = -1.0;
                activation.angular_threshold = -1.0;
                body.wake_up(true);
            }
        })
    }

    fn set_linear_damping(&mut self, damping: Real) -> Result<()> {
        self.with_body_mut(|body| body.set_linear_damping(damping))
    }

    fn set_angular_damping(&mut self, damping: Real) -> Result<()> {
        self.with_body_mut(|body| body.set_angular_damping(damping))
    }

    fn set_world_pose(&mut self, pose: &Pose) -> Result<()> {
        self.with_body_mut(|body| body.set_position(*pose, true))
    }

    fn set_linear_vel(&mut self, velocity: &Vec3) -> Result<()> {
        self.with_body_mut(|body| body.set_linvel(*velocity, true))
    }

    fn set_angular_vel(&mut self, velocity: &Vec3) -> Result<()> {
        self.with_body_mut(|body| body.set_angvel(*velocity, true))
    }

    fn set_force(&mut self, force: &Vec3) -> Result<()> {
        self.with_body_mut(|body| {
            body.reset_forces(false);
            body.add_force(*force, true);
        })
    }

    fn set_torque(&mut self, torque: &Vec3) -> Result<()> {
        self.with_body_mut(|body| {
            body.reset_torques(false);
            body.add_torque(*torque, true);
        })
    }

    fn add_force(&mut self, force: &Vec3) -> Result<()> {
        self.with_body_mut(|body| body.add_force(*force, true))
    }

    fn add_torque(&mut self, torque: &Vec3) -> Result<()> {
        self.with_body_mut(|body| body.add_torque(*torque, true))
    }

    fn add_force_at_world_position(&mut self, force: &Vec3, position: &Vec3) -> Result<()> {
        self.with_body_mut(|body| body.add_force_at_point(*force, rapier::Point::from(*position), true))
    }

    fn world_force(&self) -> Result<Vec3> {
        self.with_body(|body| body.user_force())
    }

    fn world_torque(&self) -> Result<Vec3> {
        self.with_body(|body| body.user_torque())
    }

    fn kinematics(&self) -> Result<BodyKinematics> {
        self.with_body(|body| BodyKinematics {
            pose: *body.position(),
            linear_velocity: *body.linvel(),
            angular_velocity: *body.angvel(),
        })
    }

    fn wrench(&self) -> Result<BodyWrench> {
        self.with_body(|body| BodyWrench {
            pose: *body.position(),
            force: body.user_force(),
            torque: body.user_torque(),
        })
    }

    fn update_mass(&mut self, inertial: &Inertial) -> Result<()> {
        let props = inertial.to_mass_properties();
        self.with_body_mut(|body| body.set_additional_mass_properties(props, true))
    }

    fn update_surface(&mut self, collisions: &CollisionSet) -> Result<()> {
        let handle = self.handle()?;
        let mut engine = self.engine.write();
        if engine.bodies.get(handle).is_none() {
            return Err(missing_body(handle));
        }

        let mut synced = Vec::with_capacity(collisions.len());
        for (id, collider) in self.colliders.drain(..) {
            if collisions.get_by_id(id).is_some() {
                synced.push((id, collider));
            } else {
                engine.remove_collider(collider);
            }
        }

        for collision in collisions.iter() {
            let existing = synced
                .iter()
                .find(|(id, _)| *id == collision.id())
                .map(|(_, collider)| *collider);
            match existing {
                Some(collider) if engine.refresh_collider(collider, collision) => {}
                Some(collider) => {
                    log::warn!("Rapier collider {collider:?} vanished; re-creating {}", collision.id());
                    let replacement = engine.insert_collider(handle, collision);
                    if let Some(entry) = synced.iter_mut().find(|(id, _)| *id == collision.id()) {
                        entry.1 = replacement;
                    }
                }
                None => {
                    let collider = engine.insert_collider(handle, collision);
                    synced.push((collision.id(), collider));
                }
            }
        }

        self.colliders = synced;
        Ok(())
    }

    fn clear_wrench(&mut self) -> Result<()> {
        self.with_body_mut(|body| {
            body.reset_forces(false);
            body.reset_torques(false);
        })
    }
}

impl Drop for RapierBackend {
    fn drop(&mut self) {
        if let Some(handle) = self.body.take() {
            log::warn!("Rapier body {handle:?} dropped without fini; releasing it");
            self.engine.write().remove_body(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::CollisionShape;
    use crate::config::LinkConfig;
    use crate::description::CollisionDesc;
    use approx::assert_relative_eq;

    fn sphere_set() -> CollisionSet {
        let mut set = CollisionSet::new();
        set.add(&CollisionDesc::new("ball", CollisionShape::sphere(0.5))).unwrap();
        set
    }

    fn init_backend(engine: &SharedEngine, set: &CollisionSet, config: &LinkConfig) -> RapierBackend {
        let inertial = set.composed_inertial();
        let mut backend = RapierBackend::new(engine.clone());
        backend
            .init(&BodyDesc {
                name: "ball",
                pose: Pose::translation(0.0, 0.0, 10.0),
                inertial: &inertial,
                collisions: set,
                config,
            })
            .unwrap();
        backend
    }

    #[test]
    fn test_create_engine() {
        let engine = RapierEngine::new(EngineConfig::default());
        assert_eq!(engine.body_count(), 0);
        assert_eq!(engine.collider_count(), 0);
        assert_eq!(engine.step_info().iterations, 0);
    }

    #[test]
    fn test_init_twice_fails() {
        let engine = RapierEngine::default().shared();
        let set = sphere_set();
        let config = LinkConfig::default();
        let mut backend = init_backend(&engine, &set, &config);
        let inertial = set.composed_inertial();

        let again = backend.init(&BodyDesc {
            name: "ball",
            pose: Pose::identity(),
            inertial: &inertial,
            collisions: &set,
            config: &config,
        });
        assert!(matches!(again, Err(LinkError::BackendFailure(_))));
        assert_eq!(engine.read().body_count(), 1);
    }

    #[test]
    fn test_fini_is_idempotent() {
        let engine = RapierEngine::default().shared();
        let set = sphere_set();
        let mut backend = init_backend(&engine, &set, &LinkConfig::default());

        backend.fini().unwrap();
        backend.fini().unwrap();
        assert_eq!(engine.read().body_count(), 0);
        assert_eq!(engine.read().collider_count(), 0);
        assert!(backend.kinematics().is_err());
    }

    #[test]
    fn test_forces_persist_until_cleared() {
        let engine = RapierEngine::default().shared();
        let set = sphere_set();
        let mut backend = init_backend(&engine, &set, &LinkConfig::floating());

        backend.add_force(&Vec3::new(1.0, 0.0, 0.0)).unwrap();
        backend.add_force(&Vec3::new(2.0, 0.0, 0.0)).unwrap();
        engine.write().step();
        assert_relative_eq!(backend.world_force().unwrap(), Vec3::new(3.0, 0.0, 0.0));

        backend.clear_wrench().unwrap();
        assert_relative_eq!(backend.world_force().unwrap(), Vec3::zeros());
    }

    #[test]
    fn test_wrench_matches_separate_reads() {
        let engine = RapierEngine::default().shared();
        let set = sphere_set();
        let mut backend = init_backend(&engine, &set, &LinkConfig::floating());

        backend.add_force(&Vec3::new(0.0, 4.0, 0.0)).unwrap();
        backend.add_torque(&Vec3::new(0.0, 0.0, 1.0)).unwrap();
        engine.write().step();

        let wrench = backend.wrench().unwrap();
        assert_eq!(wrench.pose, backend.kinematics().unwrap().pose);
        assert_relative_eq!(wrench.force, backend.world_force().unwrap());
        assert_relative_eq!(wrench.torque, Vec3::new(0.0, 0.0, 1.0));

        backend.fini().unwrap();
        assert!(backend.wrench().is_err());
    }

    #[test]
    fn test_gravity_fall() {
        let engine = RapierEngine::default().shared();
        let set = sphere_set();
        let backend = init_backend(&engine, &set, &LinkConfig::default());

        for _ in 0..100 {
            engine.write().step();
        }

        let kinematics = backend.kinematics().unwrap();
        assert!(kinematics.pose.translation.z < 10.0, "Body should fall due to gravity");
        assert!(kinematics.linear_velocity.z < 0.0);
    }

    #[test]
    fn test_update_surface_syncs_colliders() {
        let engine = RapierEngine::default().shared();
        let mut set = sphere_set();
        let mut backend = init_backend(&engine, &set, &LinkConfig::default());

        set.add(&CollisionDesc::new("cap", CollisionShape::cuboid(0.1, 0.1, 0.1))).unwrap();
        backend.update_surface(&set).unwrap();
        assert_eq!(engine.read().collider_count(), 2);

        set.remove("ball");
        backend.update_surface(&set).unwrap();
        assert_eq!(engine.read().collider_count(), 1);
    }

    #[test]
    fn test_drop_releases_body() {
        let engine = RapierEngine::default().shared();
        let set = sphere_set();
        {
            let _backend = init_backend(&engine, &set, &LinkConfig::default());
            assert_eq!(engine.read().body_count(), 1);
        }
        assert_eq!(engine.read().body_count(), 0);
    }
}
