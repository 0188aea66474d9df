//! The link: one rigid body of an articulated model
//!
//! A [`Link`] owns its collisions and inertial properties, keeps weak
//! references to the joints and static models attached to it, and drives a
//! [`LinkBackend`] that performs the actual integration.
//!
//! # Lifecycle
//!
//! ```text
//! Unloaded --load--> Loaded --init--> Initialized --fini--> Finalized
//!                                      |      ^
//!                                      +------+ update (once per step)
//! ```
//!
//! Configuration mutators need a loaded link. Anything that talks to the
//! engine (forces, velocities, state snapshots) needs an initialized one.
//! Both fail with [`LinkError::NotInitialized`] otherwise.
//!
//! # Frames
//!
//! World-frame quantities come from the backend. Relative accessors rotate
//! them into the link frame with [`to_local`] using the pose read in the same
//! snapshot. Accelerations are stored in the link frame.

use crate::attachment::{SharedStaticModel, StaticAttachments};
use crate::backend::{BodyDesc, BodyKinematics, BodyWrench, LinkBackend};
use crate::collision::{Collision, CollisionId, CollisionSet};
use crate::config::{finite, non_negative, LinkConfig};
use crate::description::{CollisionDesc, LinkDesc};
use crate::error::{LinkError, Result};
use crate::events::{Connection, Signal};
use crate::inertial::Inertial;
use crate::joint::{JointId, JointList, JointRole, SharedJoint};
use crate::layers::{CollideMode, CollisionGroups};
use crate::math::{point_to_world, to_local, to_world, vec3, Aabb, Mat3, Pose, Real, Vec3};
use crate::msgs::{CollisionMsg, InertialMsg, LinkMsg, PoseMsg};
use crate::state::{LinkState, StepInfo};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a link within its model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkId(pub u32);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// Lifecycle phase of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Unloaded,
    Loaded,
    Initialized,
    Finalized,
}

/// A single rigid body within an articulated model
pub struct Link {
    id: LinkId,
    name: String,
    phase: LinkPhase,
    backend: Box<dyn LinkBackend>,

    /// Cached world pose; refreshed from the backend every update
    pose: Pose,
    /// Pose from the description, restored by `reset`
    initial_pose: Pose,
    config: LinkConfig,
    selected: bool,

    inertial: Inertial,
    explicit_inertial: bool,
    collisions: CollisionSet,
    sensors: Vec<String>,

    /// Link frame
    linear_accel: Vec3,
    /// Link frame
    angular_accel: Vec3,

    /// Joints whose parent is this link
    child_joints: JointList,
    /// Joints whose child is this link
    parent_joints: JointList,
    attachments: StaticAttachments,

    enabled_signal: Signal<bool>,
    last_step: StepInfo,
}

impl Link {
    /// Create an unloaded link driven by `backend`
    pub fn new(id: LinkId, backend: Box<dyn LinkBackend>) -> Self {
        Self {
            id,
            name: String::new(),
            phase: LinkPhase::Unloaded,
            backend,
            pose: Pose::identity(),
            initial_pose: Pose::identity(),
            config: LinkConfig::default(),
            selected: false,
            inertial: Inertial::zero(),
            explicit_inertial: false,
            collisions: CollisionSet::new(),
            sensors: Vec::new(),
            linear_accel: Vec3::zeros(),
            angular_accel: Vec3::zeros(),
            child_joints: JointList::new(JointRole::Child),
            parent_joints: JointList::new(JointRole::Parent),
            attachments: StaticAttachments::new(),
            enabled_signal: Signal::new(),
            last_step: StepInfo::default(),
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> LinkPhase {
        self.phase
    }

    fn ensure_loaded(&self) -> Result<()> {
        match self.phase {
            LinkPhase::Loaded | LinkPhase::Initialized => Ok(()),
            phase => Err(LinkError::NotInitialized(format!(
                "{} '{}' is {phase:?}",
                self.id, self.name
            ))),
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        match self.phase {
            LinkPhase::Initialized => Ok(()),
            phase => Err(LinkError::NotInitialized(format!(
                "{} '{}' is {phase:?}",
                self.id, self.name
            ))),
        }
    }

    fn is_initialized(&self) -> bool {
        self.phase == LinkPhase::Initialized
    }

    // ==================== Lifecycle ====================

    /// Populate the link from a description.
    ///
    /// Nothing changes if any element is rejected.
    pub fn load(&mut self, desc: &LinkDesc) -> Result<()> {
        if self.phase != LinkPhase::Unloaded {
            return Err(LinkError::InvalidArgument(format!(
                "{} '{}' is already {:?}",
                self.id, self.name, self.phase
            )));
        }
        desc.validate()?;

        let mut collisions = CollisionSet::new();
        for collision in &desc.collisions {
            collisions.add(collision)?;
        }
        let explicit = desc.inertial.as_ref().map(|i| i.to_inertial()).transpose()?;

        self.name = desc.name.clone();
        self.pose = desc.pose.to_pose();
        self.initial_pose = self.pose;
        self.config = desc.config;
        self.collisions = collisions;
        self.sensors = desc.sensors.iter().map(|s| s.name.clone()).collect();
        if let Some(retro) = self.config.laser_retro {
            self.broadcast_laser_retro(retro);
        }
        match explicit {
            Some(inertial) => {
                self.inertial = inertial;
                self.explicit_inertial = true;
            }
            None => self.set_inertial_from_collisions(),
        }

        self.phase = LinkPhase::Loaded;
        log::debug!(
            "Loaded {} '{}' ({} collisions, mass {})",
            self.id,
            self.name,
            self.collisions.len(),
            self.inertial.mass()
        );
        Ok(())
    }

    /// Allocate the backend body
    pub fn init(&mut self) -> Result<()> {
        match self.phase {
            LinkPhase::Loaded => {}
            LinkPhase::Initialized => {
                return Err(LinkError::BackendFailure(format!(
                    "{} '{}' is already initialized",
                    self.id, self.name
                )))
            }
            _ => self.ensure_loaded()?,
        }

        self.backend.init(&BodyDesc {
            name: &self.name,
            pose: self.pose,
            inertial: &self.inertial,
            collisions: &self.collisions,
            config: &self.config,
        })?;
        self.phase = LinkPhase::Initialized;
        log::info!("Initialized {} '{}'", self.id, self.name);
        Ok(())
    }

    /// Consume the pending wrench and refresh cached state after an engine step
    pub fn update(&mut self, step: &StepInfo) -> Result<()> {
        self.ensure_initialized()?;

        let wrench = self.backend.wrench()?;
        let pose = wrench.pose;
        self.linear_accel = to_local(&pose, &(wrench.force * self.inertial.inv_mass()));
        self.angular_accel = to_local(&pose, &self.world_angular_accel_from(&pose, &wrench.torque));
        self.backend.clear_wrench()?;

        self.last_step = *step;
        self.pose = pose;
        self.on_pose_change();
        Ok(())
    }

    /// Release the backend body and every endpoint this link holds.
    ///
    /// Calling it again is a no-op.
    pub fn fini(&mut self) -> Result<()> {
        if self.phase == LinkPhase::Finalized {
            return Ok(());
        }
        self.backend.fini()?;
        self.child_joints.release_endpoint(self.id);
        self.parent_joints.release_endpoint(self.id);
        self.attachments.detach_all();
        self.phase = LinkPhase::Finalized;
        log::info!("Finalized {} '{}'", self.id, self.name);
        Ok(())
    }

    /// Back to the loaded pose, at rest, with no pending wrench
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.set_world_pose(self.initial_pose)?;
        self.backend.set_linear_vel(&Vec3::zeros())?;
        self.backend.set_angular_vel(&Vec3::zeros())?;
        self.backend.clear_wrench()?;
        self.linear_accel = Vec3::zeros();
        self.angular_accel = Vec3::zeros();
        Ok(())
    }

    /// Re-apply a description of this same link.
    ///
    /// Existing collisions are updated by name and new ones added; collisions
    /// absent from the description are kept. Sensors are replaced.
    pub fn update_parameters(&mut self, desc: &LinkDesc) -> Result<()> {
        self.ensure_loaded()?;
        if desc.name != self.name {
            return Err(LinkError::InvalidArgument(format!(
                "description for '{}' applied to '{}'",
                desc.name, self.name
            )));
        }
        desc.validate()?;
        let explicit = desc.inertial.as_ref().map(|i| i.to_inertial()).transpose()?;

        let mut collisions = self.collisions.clone();
        for collision_desc in &desc.collisions {
            match collisions.get_by_name_mut(&collision_desc.name) {
                Some(collision) => collision.update_from_desc(collision_desc)?,
                None => {
                    collisions.add(collision_desc)?;
                }
            }
        }
        self.collisions = collisions;
        self.sensors = desc.sensors.iter().map(|s| s.name.clone()).collect();

        let config = desc.config;
        self.set_gravity_mode(config.gravity)?;
        self.set_self_collide(config.self_collide)?;
        self.set_auto_disable(config.auto_disable)?;
        self.set_linear_damping(config.linear_damping)?;
        self.set_angular_damping(config.angular_damping)?;
        self.config.laser_retro = config.laser_retro;
        if let Some(retro) = config.laser_retro {
            self.broadcast_laser_retro(retro);
        }

        match explicit {
            Some(inertial) => {
                self.inertial = inertial;
                self.explicit_inertial = true;
            }
            None => {
                self.explicit_inertial = false;
                self.set_inertial_from_collisions();
            }
        }

        if self.is_initialized() {
            self.backend.update_surface(&self.collisions)?;
            self.backend.update_mass(&self.inertial)?;
        }
        if config.enabled != self.enabled() {
            self.set_enabled(config.enabled)?;
        }
        log::debug!("Updated parameters of {} '{}'", self.id, self.name);
        Ok(())
    }

    // ==================== Enabled / selection ====================

    /// Gate backend integration; subscribers hear about every transition
    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.ensure_loaded()?;
        if self.enabled() == enabled {
            return Ok(());
        }
        if self.is_initialized() {
            self.backend.set_enabled(enabled)?;
        }
        self.config.enabled = enabled;
        self.enabled_signal.emit(&enabled);
        Ok(())
    }

    pub fn enabled(&self) -> bool {
        if self.is_initialized() {
            self.backend.enabled()
        } else {
            self.config.enabled
        }
    }

    /// Subscribe to enabled transitions; hold the returned connection
    pub fn connect_enabled<F>(&self, handler: F) -> Connection
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.enabled_signal.connect(handler)
    }

    pub fn disconnect_enabled(&self, connection: Connection) {
        self.enabled_signal.disconnect(connection);
    }

    /// Mark the link selected; deselecting re-enables it
    pub fn set_selected(&mut self, selected: bool) -> Result<()> {
        self.selected = selected;
        if !selected && self.phase != LinkPhase::Unloaded && self.phase != LinkPhase::Finalized {
            self.set_enabled(true)?;
        }
        Ok(())
    }

    pub fn selected(&self) -> bool {
        self.selected
    }

    // ==================== Configuration ====================

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn set_gravity_mode(&mut self, gravity: bool) -> Result<()> {
        self.ensure_loaded()?;
        if self.is_initialized() {
            self.backend.set_gravity_mode(gravity)?;
        }
        self.config.gravity = gravity;
        Ok(())
    }

    pub fn gravity_mode(&self) -> bool {
        self.config.gravity
    }

    pub fn set_self_collide(&mut self, self_collide: bool) -> Result<()> {
        self.ensure_loaded()?;
        if self.is_initialized() {
            self.backend.set_self_collide(self_collide)?;
        }
        self.config.self_collide = self_collide;
        Ok(())
    }

    pub fn self_collide(&self) -> bool {
        self.config.self_collide
    }

    pub fn set_auto_disable(&mut self, auto_disable: bool) -> Result<()> {
        self.ensure_loaded()?;
        if self.is_initialized() {
            self.backend.set_auto_disable(auto_disable)?;
        }
        self.config.auto_disable = auto_disable;
        Ok(())
    }

    pub fn auto_disable(&self) -> bool {
        self.config.auto_disable
    }

    pub fn set_linear_damping(&mut self, damping: Real) -> Result<()> {
        self.ensure_loaded()?;
        let damping = non_negative(damping, "linear damping")?;
        if self.is_initialized() {
            self.backend.set_linear_damping(damping)?;
        }
        self.config.linear_damping = damping;
        Ok(())
    }

    pub fn linear_damping(&self) -> Real {
        self.config.linear_damping
    }

    pub fn set_angular_damping(&mut self, damping: Real) -> Result<()> {
        self.ensure_loaded()?;
        let damping = non_negative(damping, "angular damping")?;
        if self.is_initialized() {
            self.backend.set_angular_damping(damping)?;
        }
        self.config.angular_damping = damping;
        Ok(())
    }

    pub fn angular_damping(&self) -> Real {
        self.config.angular_damping
    }

    /// Apply a named collide mode to every collision.
    ///
    /// An unknown name fails before any collision is touched.
    pub fn set_collide_mode(&mut self, mode: &str) -> Result<()> {
        let mode = mode.parse::<CollideMode>().map_err(|err| {
            log::warn!("{} '{}': {err}", self.id, self.name);
            err
        })?;
        self.ensure_loaded()?;

        let groups = mode.groups();
        for collision in self.collisions.iter_mut() {
            collision.set_groups(groups);
        }
        if self.is_initialized() {
            self.backend.update_surface(&self.collisions)?;
        }
        log::debug!("{} '{}' collide mode set to {mode}", self.id, self.name);
        Ok(())
    }

    /// Broadcast a laser reflectance to every collision
    pub fn set_laser_retro(&mut self, retro: Real) -> Result<()> {
        let retro = finite(retro, "laser retro")?;
        self.ensure_loaded()?;
        self.config.laser_retro = Some(retro);
        self.broadcast_laser_retro(retro);
        Ok(())
    }

    fn broadcast_laser_retro(&mut self, retro: Real) {
        for collision in self.collisions.iter_mut() {
            collision.set_laser_retro(retro);
        }
    }

    // ==================== Pose ====================

    /// World pose as of the last update or explicit set
    pub fn world_pose(&self) -> Pose {
        self.pose
    }

    /// Move the link, and everything attached to it
    pub fn set_world_pose(&mut self, pose: Pose) -> Result<()> {
        self.ensure_loaded()?;
        if self.is_initialized() {
            self.backend.set_world_pose(&pose)?;
        }
        self.pose = pose;
        self.on_pose_change();
        Ok(())
    }

    /// Refresh poses that follow this link
    pub fn on_pose_change(&mut self) {
        self.attachments.update(&self.pose);
    }

    // ==================== Velocities ====================

    fn kinematics(&self) -> Result<BodyKinematics> {
        self.ensure_initialized()?;
        self.backend.kinematics()
    }

    pub fn set_linear_vel(&mut self, velocity: Vec3) -> Result<()> {
        self.ensure_initialized()?;
        self.backend.set_linear_vel(&velocity)
    }

    pub fn set_angular_vel(&mut self, velocity: Vec3) -> Result<()> {
        self.ensure_initialized()?;
        self.backend.set_angular_vel(&velocity)
    }

    pub fn world_linear_vel(&self) -> Result<Vec3> {
        Ok(self.kinematics()?.linear_velocity)
    }

    pub fn world_angular_vel(&self) -> Result<Vec3> {
        Ok(self.kinematics()?.angular_velocity)
    }

    pub fn relative_linear_vel(&self) -> Result<Vec3> {
        let k = self.kinematics()?;
        Ok(to_local(&k.pose, &k.linear_velocity))
    }

    pub fn relative_angular_vel(&self) -> Result<Vec3> {
        let k = self.kinematics()?;
        Ok(to_local(&k.pose, &k.angular_velocity))
    }

    // ==================== Forces ====================

    /// Replace the pending world force
    pub fn set_force(&mut self, force: Vec3) -> Result<()> {
        self.ensure_initialized()?;
        self.backend.set_force(&force)
    }

    /// Replace the pending world torque
    pub fn set_torque(&mut self, torque: Vec3) -> Result<()> {
        self.ensure_initialized()?;
        self.backend.set_torque(&torque)
    }

    /// Accumulate a world force for the next step
    pub fn add_force(&mut self, force: Vec3) -> Result<()> {
        self.ensure_initialized()?;
        self.backend.add_force(&force)
    }

    /// Accumulate a world torque for the next step
    pub fn add_torque(&mut self, torque: Vec3) -> Result<()> {
        self.ensure_initialized()?;
        self.backend.add_torque(&torque)
    }

    /// Accumulate a link-frame force
    pub fn add_relative_force(&mut self, force: Vec3) -> Result<()> {
        let pose = self.kinematics()?.pose;
        self.backend.add_force(&to_world(&pose, &force))
    }

    /// Accumulate a link-frame torque
    pub fn add_relative_torque(&mut self, torque: Vec3) -> Result<()> {
        let pose = self.kinematics()?.pose;
        self.backend.add_torque(&to_world(&pose, &torque))
    }

    /// Accumulate a world force applied at a world position
    pub fn add_force_at_world_position(&mut self, force: Vec3, position: Vec3) -> Result<()> {
        self.ensure_initialized()?;
        self.backend.add_force_at_world_position(&force, &position)
    }

    /// Accumulate a world force applied at a link-frame position
    pub fn add_force_at_relative_position(&mut self, force: Vec3, position: Vec3) -> Result<()> {
        let pose = self.kinematics()?.pose;
        self.backend
            .add_force_at_world_position(&force, &point_to_world(&pose, &position))
    }

    /// Pending world force
    pub fn world_force(&self) -> Result<Vec3> {
        self.ensure_initialized()?;
        self.backend.world_force()
    }

    /// Pending world torque
    pub fn world_torque(&self) -> Result<Vec3> {
        self.ensure_initialized()?;
        self.backend.world_torque()
    }

    pub fn relative_force(&self) -> Result<Vec3> {
        let wrench = self.wrench()?;
        Ok(to_local(&wrench.pose, &wrench.force))
    }

    pub fn relative_torque(&self) -> Result<Vec3> {
        let wrench = self.wrench()?;
        Ok(to_local(&wrench.pose, &wrench.torque))
    }

    fn wrench(&self) -> Result<BodyWrench> {
        self.ensure_initialized()?;
        self.backend.wrench()
    }

    // ==================== Accelerations ====================

    /// Demand a link-frame linear acceleration for the next step.
    ///
    /// The pending force is replaced with the one producing it.
    pub fn set_linear_accel(&mut self, accel: Vec3) -> Result<()> {
        let pose = self.kinematics()?.pose;
        self.backend
            .set_force(&(to_world(&pose, &accel) * self.inertial.mass()))?;
        self.linear_accel = accel;
        self.set_enabled(true)
    }

    /// Demand a link-frame angular acceleration for the next step.
    ///
    /// The pending torque is replaced with the one producing it.
    pub fn set_angular_accel(&mut self, accel: Vec3) -> Result<()> {
        let pose = self.kinematics()?.pose;
        let torque = world_inertia(&pose, &self.inertial) * to_world(&pose, &accel);
        self.backend.set_torque(&torque)?;
        self.angular_accel = accel;
        self.set_enabled(true)
    }

    pub fn relative_linear_accel(&self) -> Vec3 {
        self.linear_accel
    }

    pub fn relative_angular_accel(&self) -> Vec3 {
        self.angular_accel
    }

    pub fn world_linear_accel(&self) -> Vec3 {
        to_world(&self.pose, &self.linear_accel)
    }

    pub fn world_angular_accel(&self) -> Vec3 {
        to_world(&self.pose, &self.angular_accel)
    }

    fn world_angular_accel_from(&self, pose: &Pose, torque: &Vec3) -> Vec3 {
        world_inertia(pose, &self.inertial)
            .try_inverse()
            .map(|inv| inv * torque)
            .unwrap_or_else(Vec3::zeros)
    }

    // ==================== Inertial ====================

    pub fn inertial(&self) -> &Inertial {
        &self.inertial
    }

    /// Replace the inertial properties outright
    pub fn set_inertial(&mut self, inertial: Inertial) -> Result<()> {
        self.ensure_loaded()?;
        self.inertial = inertial;
        self.explicit_inertial = true;
        if self.is_initialized() {
            self.backend.update_mass(&self.inertial)?;
        }
        Ok(())
    }

    /// Whether the inertial came from an override rather than the collisions
    pub fn has_explicit_inertial(&self) -> bool {
        self.explicit_inertial
    }

    fn set_inertial_from_collisions(&mut self) {
        self.inertial = self.collisions.composed_inertial();
    }

    /// Push the current inertial to the backend
    pub fn update_mass(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.backend.update_mass(&self.inertial)
    }

    /// Push the current collision parameters to the backend
    pub fn update_surface(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.backend.update_surface(&self.collisions)
    }

    // ==================== Collisions ====================

    /// Add a collision, recomposing the inertial unless it was overridden
    pub fn add_collision(&mut self, desc: &CollisionDesc) -> Result<CollisionId> {
        self.ensure_loaded()?;
        let id = self.collisions.add(desc)?;
        if let Some(retro) = self.config.laser_retro {
            if let Some(collision) = self.collisions.get_by_id_mut(id) {
                collision.set_laser_retro(retro);
            }
        }
        self.collisions_changed()?;
        Ok(id)
    }

    /// Remove a collision by name; returns `false` if there was none
    pub fn remove_collision(&mut self, name: &str) -> Result<bool> {
        self.ensure_loaded()?;
        if self.collisions.remove(name).is_none() {
            return Ok(false);
        }
        self.collisions_changed()?;
        Ok(true)
    }

    fn collisions_changed(&mut self) -> Result<()> {
        if !self.explicit_inertial {
            self.set_inertial_from_collisions();
        }
        if self.is_initialized() {
            self.backend.update_surface(&self.collisions)?;
            self.backend.update_mass(&self.inertial)?;
        }
        Ok(())
    }

    pub fn collisions(&self) -> &CollisionSet {
        &self.collisions
    }

    pub fn collision(&self, name: &str) -> Option<&Collision> {
        self.collisions.get_by_name(name)
    }

    pub fn collision_by_index(&self, index: usize) -> Option<&Collision> {
        self.collisions.get(index)
    }

    pub fn collision_by_id(&self, id: CollisionId) -> Option<&Collision> {
        self.collisions.get_by_id(id)
    }

    /// World-frame union of every collision's box; zero box without collisions
    pub fn bounding_box(&self) -> Aabb {
        self.collisions.bounding_box(&self.pose)
    }

    // ==================== Joints ====================

    /// Record a joint whose parent is this link
    pub fn add_child_joint(&mut self, joint: &SharedJoint) -> Result<bool> {
        let (id, parent) = {
            let joint = joint.read();
            (joint.id(), joint.parent())
        };
        if parent != Some(self.id) {
            return Err(LinkError::InvalidArgument(format!(
                "{id} does not have {} as parent",
                self.id
            )));
        }
        Ok(self.child_joints.add(joint))
    }

    /// Record a joint whose child is this link
    pub fn add_parent_joint(&mut self, joint: &SharedJoint) -> Result<bool> {
        let (id, child) = {
            let joint = joint.read();
            (joint.id(), joint.child())
        };
        if child != Some(self.id) {
            return Err(LinkError::InvalidArgument(format!(
                "{id} does not have {} as child",
                self.id
            )));
        }
        Ok(self.parent_joints.add(joint))
    }

    pub fn remove_child_joint(&mut self, id: JointId) -> bool {
        self.child_joints.remove(id)
    }

    pub fn remove_parent_joint(&mut self, id: JointId) -> bool {
        self.parent_joints.remove(id)
    }

    pub fn child_joints(&self) -> &JointList {
        &self.child_joints
    }

    pub fn parent_joints(&self) -> &JointList {
        &self.parent_joints
    }

    /// Links at the child end of every child joint
    pub fn child_joints_links(&self) -> Result<Vec<LinkId>> {
        self.child_joints.neighbor_links(self.id)
    }

    /// Links at the parent end of every parent joint
    pub fn parent_joints_links(&self) -> Result<Vec<LinkId>> {
        self.parent_joints.neighbor_links(self.id)
    }

    // ==================== Static attachments ====================

    /// Lock a static model to `world_pose * offset`
    pub fn attach_static_model(&mut self, model: &SharedStaticModel, offset: Pose) -> Result<()> {
        self.ensure_loaded()?;
        self.attachments.attach(model, offset, &self.pose);
        Ok(())
    }

    pub fn detach_static_model(&mut self, name: &str) -> bool {
        self.attachments.detach(name)
    }

    pub fn detach_all_static_models(&mut self) {
        self.attachments.detach_all();
    }

    pub fn attached_models(&self) -> &StaticAttachments {
        &self.attachments
    }

    // ==================== Sensors ====================

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Sensor name at `index`; empty when out of range
    pub fn sensor_name(&self, index: usize) -> &str {
        self.sensors.get(index).map(String::as_str).unwrap_or("")
    }

    // ==================== Messages ====================

    /// Write a snapshot of this link into `msg`
    pub fn fill_msg(&self, msg: &mut LinkMsg) {
        msg.id = self.id.0;
        msg.name = self.name.clone();
        msg.pose = Some(PoseMsg::from(&self.pose));
        msg.enabled = Some(self.enabled());
        msg.gravity = Some(self.config.gravity);
        msg.self_collide = Some(self.config.self_collide);
        msg.linear_damping = Some(self.config.linear_damping);
        msg.angular_damping = Some(self.config.angular_damping);
        match self.kinematics() {
            Ok(k) => {
                msg.linear_velocity = Some([k.linear_velocity.x, k.linear_velocity.y, k.linear_velocity.z]);
                msg.angular_velocity = Some([k.angular_velocity.x, k.angular_velocity.y, k.angular_velocity.z]);
            }
            Err(_) => {
                msg.linear_velocity = None;
                msg.angular_velocity = None;
            }
        }
        msg.inertial = Some(InertialMsg::from(&self.inertial));
        msg.collisions = self.collisions.iter().map(CollisionMsg::from).collect();
        msg.sensors = self.sensors.clone();
    }

    /// Apply every field present in `msg`; messages for other links are ignored.
    ///
    /// Every field is checked before the first one is applied, so a rejected
    /// message leaves the link untouched.
    pub fn process_msg(&mut self, msg: &LinkMsg) -> Result<()> {
        if msg.id != self.id.0 {
            log::debug!("{} ignoring message for link#{}", self.id, msg.id);
            return Ok(());
        }
        self.ensure_loaded()?;
        if (msg.linear_velocity.is_some() || msg.angular_velocity.is_some()) && !self.is_initialized() {
            return Err(LinkError::NotInitialized(format!(
                "{} '{}' cannot take velocities before init",
                self.id, self.name
            )));
        }

        let pose = msg.pose.as_ref().map(PoseMsg::to_pose).transpose()?;
        let inertial = msg.inertial.as_ref().map(InertialMsg::to_inertial).transpose()?;
        let linear_damping = msg
            .linear_damping
            .map(|d| non_negative(d, "linear damping"))
            .transpose()?;
        let angular_damping = msg
            .angular_damping
            .map(|d| non_negative(d, "angular damping"))
            .transpose()?;
        let linear_velocity = msg.linear_velocity.map(|v| finite_vec(v, "linear velocity")).transpose()?;
        let angular_velocity = msg.angular_velocity.map(|v| finite_vec(v, "angular velocity")).transpose()?;
        let collision_updates = msg
            .collisions
            .iter()
            .map(|c| -> Result<_> {
                let pose = c.pose.to_pose()?;
                let retro = finite(c.laser_retro, "laser retro")?;
                Ok((CollisionId(c.id), pose, retro, CollisionGroups::new(c.category_bits, c.collide_bits)))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(pose) = pose {
            self.set_world_pose(pose)?;
        }
        if let Some(gravity) = msg.gravity {
            self.set_gravity_mode(gravity)?;
        }
        if let Some(self_collide) = msg.self_collide {
            self.set_self_collide(self_collide)?;
        }
        if let Some(damping) = linear_damping {
            self.set_linear_damping(damping)?;
        }
        if let Some(damping) = angular_damping {
            self.set_angular_damping(damping)?;
        }
        if let Some(velocity) = linear_velocity {
            self.set_linear_vel(velocity)?;
        }
        if let Some(velocity) = angular_velocity {
            self.set_angular_vel(velocity)?;
        }
        if let Some(inertial) = inertial {
            self.set_inertial(inertial)?;
        }

        if !collision_updates.is_empty() {
            for (id, pose, retro, groups) in collision_updates {
                match self.collisions.get_by_id_mut(id) {
                    Some(collision) => {
                        collision.set_local_pose(pose);
                        collision.set_laser_retro(retro);
                        collision.set_groups(groups);
                    }
                    None => log::warn!("{} '{}' has no {id}", self.id, self.name),
                }
            }
            if !self.explicit_inertial {
                self.set_inertial_from_collisions();
            }
            if self.is_initialized() {
                self.backend.update_surface(&self.collisions)?;
                self.backend.update_mass(&self.inertial)?;
            }
        }

        if let Some(enabled) = msg.enabled {
            self.set_enabled(enabled)?;
        }
        Ok(())
    }

    // ==================== State ====================

    /// Snapshot pose, velocities and accelerations
    pub fn state(&self) -> Result<LinkState> {
        let k = self.kinematics()?;
        Ok(LinkState::new(
            self.name.clone(),
            &self.last_step,
            k.pose,
            k.linear_velocity,
            k.angular_velocity,
            to_world(&k.pose, &self.linear_accel),
            to_world(&k.pose, &self.angular_accel),
        ))
    }

    /// Restore pose, velocities and accelerations from a snapshot
    pub fn set_state(&mut self, state: &LinkState) -> Result<()> {
        self.ensure_initialized()?;
        let pose = *state.pose();
        self.set_world_pose(pose)?;
        self.backend.set_linear_vel(&state.linear_velocity())?;
        self.backend.set_angular_vel(&state.angular_velocity())?;
        self.linear_accel = to_local(&pose, &state.linear_accel());
        self.angular_accel = to_local(&pose, &state.angular_accel());
        Ok(())
    }

    /// Marker of the step this link last updated at
    pub fn last_step(&self) -> &StepInfo {
        &self.last_step
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("pose", &self.pose)
            .field("collisions", &self.collisions.len())
            .field("child_joints", &self.child_joints)
            .field("parent_joints", &self.parent_joints)
            .finish_non_exhaustive()
    }
}

/// Inertia tensor about the center of mass, in world axes
fn world_inertia(pose: &Pose, inertial: &Inertial) -> Mat3 {
    let rotation = pose.rotation.to_rotation_matrix();
    rotation.matrix() * inertial.inertia() * rotation.matrix().transpose()
}

fn finite_vec(v: [Real; 3], what: &str) -> Result<Vec3> {
    if v.iter().all(|c| c.is_finite()) {
        Ok(vec3(v))
    } else {
        Err(LinkError::InvalidArgument(format!("{what} must be finite, got {v:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::StaticModel;
    use crate::backend::mock::MockBackend;
    use crate::collision::CollisionShape;
    use crate::description::{InertialDesc, PoseDesc};
    use crate::joint::Joint;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn two_spheres() -> LinkDesc {
        LinkDesc::new("arm")
            .with_collision(
                CollisionDesc::new("a", CollisionShape::sphere(0.1))
                    .with_pose(PoseDesc::at(1.0, 0.0, 0.0))
                    .with_inertial(InertialDesc::new(1.0)),
            )
            .with_collision(
                CollisionDesc::new("b", CollisionShape::sphere(0.1))
                    .with_pose(PoseDesc::at(0.0, 3.0, 0.0))
                    .with_inertial(InertialDesc::new(3.0)),
            )
            .with_sensor("camera")
    }

    fn loaded(desc: &LinkDesc) -> Link {
        let mut link = Link::new(LinkId(1), Box::new(MockBackend::default()));
        link.load(desc).unwrap();
        link
    }

    fn initialized(desc: &LinkDesc) -> Link {
        let mut link = loaded(desc);
        link.init().unwrap();
        link
    }

    #[test]
    fn test_mutators_before_load_fail() {
        let mut link = Link::new(LinkId(0), Box::new(MockBackend::default()));

        assert!(matches!(link.set_gravity_mode(false), Err(LinkError::NotInitialized(_))));
        assert!(matches!(link.init(), Err(LinkError::NotInitialized(_))));
        assert!(matches!(
            link.update(&StepInfo::default()),
            Err(LinkError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_forces_need_init() {
        let mut link = loaded(&two_spheres());
        assert!(matches!(link.add_force(Vec3::x()), Err(LinkError::NotInitialized(_))));
    }

    #[test]
    fn test_inertial_composed_from_collisions() {
        let link = loaded(&two_spheres());

        assert_relative_eq!(link.inertial().mass(), 4.0);
        assert_relative_eq!(link.inertial().com(), Vec3::new(0.25, 2.25, 0.0), epsilon = 1e-5);
        assert!(!link.has_explicit_inertial());
    }

    #[test]
    fn test_collision_delta_recomposes() {
        let mut link = loaded(&two_spheres());

        link.remove_collision("b").unwrap();
        assert_relative_eq!(link.inertial().mass(), 1.0);
        assert_relative_eq!(link.inertial().com(), Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);

        link.add_collision(
            &CollisionDesc::new("c", CollisionShape::sphere(0.1))
                .with_pose(PoseDesc::at(-1.0, 0.0, 0.0))
                .with_inertial(InertialDesc::new(1.0)),
        )
        .unwrap();
        assert_relative_eq!(link.inertial().mass(), 2.0);
        assert_relative_eq!(link.inertial().com(), Vec3::zeros(), epsilon = 1e-5);
    }

    #[test]
    fn test_explicit_inertial_wins() {
        let desc = two_spheres().with_inertial(InertialDesc::new(10.0));
        let mut link = loaded(&desc);
        assert_relative_eq!(link.inertial().mass(), 10.0);

        link.remove_collision("a").unwrap();
        assert_relative_eq!(link.inertial().mass(), 10.0);
    }

    #[test]
    fn test_duplicate_collision_rejected() {
        let mut link = loaded(&two_spheres());
        let err = link
            .add_collision(&CollisionDesc::new("a", CollisionShape::sphere(1.0)))
            .unwrap_err();
        assert!(matches!(err, LinkError::DuplicateName(_)));
        assert_eq!(link.collisions().len(), 2);
    }

    #[test]
    fn test_collision_lookups() {
        let link = loaded(&two_spheres());

        let b = link.collision("b").unwrap();
        assert_eq!(link.collision_by_id(b.id()).unwrap().name(), "b");
        assert_eq!(link.collision_by_index(0).unwrap().name(), "a");
        assert!(link.collision("missing").is_none());
        assert!(link.collision_by_index(9).is_none());
    }

    #[test]
    fn test_collide_mode() {
        let mut link = loaded(&two_spheres());

        link.set_collide_mode("fixed").unwrap();
        let err = link.set_collide_mode("bogus").unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(link.collisions().iter().all(|c| c.groups() == CollideMode::Fixed.groups()));

        link.set_collide_mode("none").unwrap();
        assert!(link.collisions().iter().all(|c| c.groups() == CollisionGroups::NONE));
        assert!(link.collisions().iter().all(|c| !c.groups().participates()));
    }

    #[test]
    fn test_laser_retro_broadcast() {
        let mut link = loaded(&two_spheres());
        link.set_laser_retro(0.7).unwrap();
        assert!(link.collisions().iter().all(|c| c.laser_retro() == 0.7));
    }

    #[test]
    fn test_sensor_names() {
        let link = loaded(&two_spheres());
        assert_eq!(link.sensor_count(), 1);
        assert_eq!(link.sensor_name(0), "camera");
        assert_eq!(link.sensor_name(5), "");
    }

    #[test]
    fn test_add_force_accumulates_until_update() {
        let mut link = initialized(&two_spheres());

        link.add_force(Vec3::new(1.0, 0.0, 0.0)).unwrap();
        link.add_force(Vec3::new(0.0, 2.0, 0.0)).unwrap();
        link.add_force(Vec3::new(3.0, 0.0, -1.0)).unwrap();
        assert_relative_eq!(link.world_force().unwrap(), Vec3::new(4.0, 2.0, -1.0));

        link.update(&StepInfo::default()).unwrap();
        assert_relative_eq!(link.world_force().unwrap(), Vec3::zeros());
        assert_relative_eq!(link.relative_linear_accel(), Vec3::new(1.0, 0.5, -0.25));
    }

    #[test]
    fn test_relative_quantities_use_pose() {
        let mut link = initialized(&two_spheres());
        // Yaw by 90 degrees: link x is world y
        let pose = Pose::new(Vec3::zeros(), Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2));
        link.set_world_pose(pose).unwrap();

        link.set_linear_vel(Vec3::new(0.0, 2.0, 0.0)).unwrap();
        assert_relative_eq!(link.relative_linear_vel().unwrap(), Vec3::new(2.0, 0.0, 0.0), epsilon = 1e-5);

        link.add_relative_force(Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(link.world_force().unwrap(), Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(link.relative_force().unwrap(), Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);

        link.add_relative_torque(Vec3::new(0.0, 2.0, 0.0)).unwrap();
        assert_relative_eq!(link.world_torque().unwrap(), Vec3::new(-2.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(link.relative_torque().unwrap(), Vec3::new(0.0, 2.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_force_at_position_adds_torque() {
        let desc = LinkDesc::new("box").with_inertial(InertialDesc::new(1.0));
        let mut link = initialized(&desc);

        link.add_force_at_relative_position(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0))
            .unwrap();
        assert_relative_eq!(link.world_torque().unwrap(), Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_linear_accel_setter_drives_force() {
        let mut link = initialized(&two_spheres());
        link.set_linear_accel(Vec3::new(0.0, 0.0, 2.0)).unwrap();

        assert_relative_eq!(link.world_force().unwrap(), Vec3::new(0.0, 0.0, 8.0));
        link.update(&StepInfo::default()).unwrap();
        assert_relative_eq!(link.world_linear_accel(), Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_state_round_trip() {
        let mut link = initialized(&two_spheres());
        link.set_world_pose(Pose::translation(1.0, 2.0, 3.0)).unwrap();
        link.set_linear_vel(Vec3::new(0.5, 0.0, 0.0)).unwrap();
        link.add_force(Vec3::new(4.0, 0.0, 0.0)).unwrap();
        link.update(&StepInfo { sim_time: 0.5, iterations: 500, dt: 0.001 }).unwrap();

        let saved = link.state().unwrap();
        assert_eq!(saved.iterations(), 500);
        link.set_state(&saved).unwrap();
        let same = link.state().unwrap();
        assert_relative_eq!(same.pose().translation.vector, saved.pose().translation.vector);
        assert_relative_eq!(same.linear_accel(), saved.linear_accel());

        link.set_world_pose(Pose::identity()).unwrap();
        link.set_linear_vel(Vec3::zeros()).unwrap();
        link.set_state(&saved).unwrap();

        let restored = link.state().unwrap();
        assert_relative_eq!(restored.pose().translation.vector, Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(restored.linear_velocity(), Vec3::new(0.5, 0.0, 0.0));
        assert_relative_eq!(restored.linear_accel(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_enabled_signal() {
        let mut link = initialized(&two_spheres());
        let disabled = Arc::new(AtomicU32::new(0));
        let disabled_clone = disabled.clone();

        let conn = link.connect_enabled(move |enabled| {
            if !*enabled {
                disabled_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        link.set_enabled(false).unwrap();
        link.set_enabled(false).unwrap();
        assert_eq!(disabled.load(Ordering::SeqCst), 1);
        assert!(!link.enabled());

        link.set_selected(true).unwrap();
        link.set_selected(false).unwrap();
        assert!(link.enabled());

        link.disconnect_enabled(conn);
        link.set_enabled(false).unwrap();
        assert_eq!(disabled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_joint_lists() {
        let mut parent = loaded(&two_spheres());
        let joint = Joint::new(JointId(0), "elbow", LinkId(1), LinkId(2)).shared();

        assert!(parent.add_child_joint(&joint).unwrap());
        assert!(!parent.add_child_joint(&joint).unwrap());
        assert!(parent.add_parent_joint(&joint).unwrap_err().is_invalid_argument());
        assert_eq!(parent.child_joints_links().unwrap(), vec![LinkId(2)]);

        assert!(parent.remove_child_joint(JointId(0)));
        assert!(!parent.remove_child_joint(JointId(0)));
        assert!(parent.child_joints_links().unwrap().is_empty());
    }

    #[test]
    fn test_fini_releases_endpoints() {
        let mut link = initialized(&two_spheres());
        let joint = Joint::new(JointId(0), "elbow", LinkId(1), LinkId(2)).shared();
        link.add_child_joint(&joint).unwrap();

        link.fini().unwrap();
        link.fini().unwrap();
        assert_eq!(link.phase(), LinkPhase::Finalized);
        assert_eq!(joint.read().parent(), None);
        assert!(matches!(link.add_force(Vec3::x()), Err(LinkError::NotInitialized(_))));
    }

    #[test]
    fn test_attachment_follows_pose() {
        let mut link = loaded(&two_spheres());
        let model = StaticModel::new("lamp", Pose::identity()).shared();

        link.attach_static_model(&model, Pose::translation(0.0, 0.0, 1.0)).unwrap();
        link.set_world_pose(Pose::translation(5.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(model.read().pose().translation.vector, Vec3::new(5.0, 0.0, 1.0));

        assert!(link.detach_static_model("lamp"));
        link.set_world_pose(Pose::identity()).unwrap();
        assert_relative_eq!(model.read().pose().translation.vector, Vec3::new(5.0, 0.0, 1.0));
    }

    #[test]
    fn test_reset() {
        let desc = two_spheres().with_pose(PoseDesc::at(0.0, 0.0, 2.0));
        let mut link = initialized(&desc);
        link.set_world_pose(Pose::translation(9.0, 9.0, 9.0)).unwrap();
        link.set_angular_vel(Vec3::z()).unwrap();
        link.add_torque(Vec3::x()).unwrap();

        link.reset().unwrap();
        assert_relative_eq!(link.world_pose().translation.vector, Vec3::new(0.0, 0.0, 2.0));
        assert_relative_eq!(link.world_angular_vel().unwrap(), Vec3::zeros());
        assert_relative_eq!(link.world_torque().unwrap(), Vec3::zeros());
    }

    #[test]
    fn test_update_parameters() {
        let mut link = loaded(&two_spheres());

        let mut desc = two_spheres();
        desc.config.gravity = false;
        desc.config.linear_damping = 0.3;
        desc.collisions[0].inertial = Some(InertialDesc::new(5.0));
        desc.sensors.clear();
        link.update_parameters(&desc).unwrap();

        assert!(!link.gravity_mode());
        assert_relative_eq!(link.linear_damping(), 0.3);
        assert_relative_eq!(link.inertial().mass(), 8.0);
        assert_eq!(link.sensor_count(), 0);

        let other = LinkDesc::new("leg");
        assert!(link.update_parameters(&other).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_rejected_parameters_change_nothing() {
        let mut link = initialized(&two_spheres());

        let mut desc = two_spheres();
        desc.config.gravity = false;
        desc.config.linear_damping = -1.0;
        desc.sensors.clear();
        assert!(link.update_parameters(&desc).unwrap_err().is_invalid_argument());

        assert!(link.gravity_mode());
        assert_eq!(link.sensor_count(), 1);
        assert_relative_eq!(link.linear_damping(), 0.0);
    }

    #[test]
    fn test_load_rejects_negative_damping() {
        let mut desc = two_spheres();
        desc.config.linear_damping = -5.0;

        let mut link = Link::new(LinkId(1), Box::new(MockBackend::default()));
        assert!(link.load(&desc).unwrap_err().is_invalid_argument());
        assert_eq!(link.phase(), LinkPhase::Unloaded);
    }

    #[test]
    fn test_laser_retro_must_be_finite() {
        let mut link = loaded(&two_spheres());
        link.set_laser_retro(0.5).unwrap();
        assert!(link.set_laser_retro(Real::NAN).unwrap_err().is_invalid_argument());
        for collision in link.collisions().iter() {
            assert_relative_eq!(collision.laser_retro(), 0.5);
        }
    }

    #[test]
    fn test_msg_round_trip() {
        let mut link = initialized(&two_spheres());
        link.set_world_pose(Pose::translation(1.0, 0.0, 0.0)).unwrap();

        let mut msg = LinkMsg::default();
        link.fill_msg(&mut msg);
        assert_eq!(msg.id, 1);
        assert_eq!(msg.collisions.len(), 2);
        assert_eq!(msg.sensors, vec!["camera".to_string()]);
        assert_relative_eq!(msg.inertial.unwrap().mass, 4.0);

        let mut update = LinkMsg::for_link(1);
        update.gravity = Some(false);
        update.pose = Some(PoseMsg::from(&Pose::translation(0.0, 0.0, 7.0)));
        link.process_msg(&update).unwrap();
        assert!(!link.gravity_mode());
        assert_relative_eq!(link.world_pose().translation.vector, Vec3::new(0.0, 0.0, 7.0));

        let mut foreign = LinkMsg::for_link(99);
        foreign.gravity = Some(true);
        link.process_msg(&foreign).unwrap();
        assert!(!link.gravity_mode());
    }

    #[test]
    fn test_degenerate_pose_msg_rejected() {
        let mut link = initialized(&two_spheres());
        let lamp = StaticModel::new("lamp", Pose::identity()).shared();
        link.attach_static_model(&lamp, Pose::translation(0.0, 0.0, 1.0)).unwrap();
        let before = link.world_pose();

        let mut msg = LinkMsg::for_link(1);
        msg.gravity = Some(false);
        msg.pose = Some(PoseMsg {
            position: [1.0, 0.0, 0.0],
            orientation: [0.0; 4],
        });
        assert!(link.process_msg(&msg).unwrap_err().is_invalid_argument());

        assert_eq!(link.world_pose(), before);
        assert!(link.gravity_mode());
        assert!(lamp.read().pose().rotation.w.is_finite());
        let aabb = link.bounding_box();
        assert!(aabb.mins.iter().chain(aabb.maxs.iter()).all(|v| v.is_finite()));
    }

    #[test]
    fn test_bad_msg_field_applies_nothing() {
        let mut link = initialized(&two_spheres());

        let mut msg = LinkMsg::for_link(1);
        msg.pose = Some(PoseMsg::from(&Pose::translation(0.0, 0.0, 5.0)));
        msg.linear_velocity = Some([1.0, 0.0, 0.0]);
        msg.angular_damping = Some(-1.0);
        assert!(link.process_msg(&msg).unwrap_err().is_invalid_argument());

        assert_relative_eq!(link.world_pose().translation.vector, Vec3::zeros());
        assert_relative_eq!(link.world_linear_vel().unwrap(), Vec3::zeros());
        assert_relative_eq!(link.angular_damping(), 0.0);
    }

    #[test]
    fn test_collision_msg_updates_collision() {
        let mut link = initialized(&two_spheres());
        let id = link.collision("a").unwrap().id();

        let mut msg = LinkMsg::for_link(1);
        msg.collisions.push(CollisionMsg {
            id: id.0,
            name: "a".into(),
            pose: PoseMsg::from(&Pose::translation(-3.0, 0.0, 0.0)),
            laser_retro: 0.75,
            category_bits: CollisionGroups::SENSOR_BITS,
            collide_bits: 0,
        });
        link.process_msg(&msg).unwrap();

        let a = link.collision_by_id(id).unwrap();
        assert_relative_eq!(a.local_pose().translation.vector, Vec3::new(-3.0, 0.0, 0.0));
        assert_relative_eq!(a.laser_retro(), 0.75);
        assert_eq!(a.groups(), CollisionGroups::new(CollisionGroups::SENSOR_BITS, 0));
        // Untouched collision keeps its values
        assert_eq!(link.collision("b").unwrap().groups(), CollisionGroups::ALL);

        // (1 * -3 + 3 * 0) / 4 and (1 * 0 + 3 * 3) / 4
        assert_relative_eq!(link.inertial().mass(), 4.0);
        assert_relative_eq!(link.inertial().com(), Vec3::new(-0.75, 2.25, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_collision_msg_with_bad_pose_rejected() {
        let mut link = initialized(&two_spheres());
        let com = link.inertial().com();

        let mut msg = LinkMsg::for_link(1);
        msg.collisions.push(CollisionMsg {
            id: 0,
            name: "a".into(),
            pose: PoseMsg {
                position: [Real::NAN, 0.0, 0.0],
                orientation: [0.0, 0.0, 0.0, 1.0],
            },
            laser_retro: 0.0,
            category_bits: 0,
            collide_bits: 0,
        });
        assert!(link.process_msg(&msg).unwrap_err().is_invalid_argument());
        assert_relative_eq!(link.inertial().com(), com);
        assert_eq!(link.collision("a").unwrap().groups(), CollisionGroups::ALL);
    }
}
