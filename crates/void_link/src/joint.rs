//! Joints and the non-owning joint lists kept by links
//!
//! Joints are owned by their model as [`SharedJoint`]s. A link only keeps
//! [`JointRef`]s (weak pointers), so link and joint teardown order can never
//! double-free, and a joint that outlived its bookkeeping is detected as
//! [`LinkError::DanglingJointReference`] instead of being silently followed.

use crate::error::{LinkError, Result};
use crate::link::LinkId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};

/// Identifier of a joint within its model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JointId(pub u32);

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "joint#{}", self.0)
    }
}

/// A constraint between a parent and a child link.
///
/// An endpoint is `None` once the link at that end has been finalized.
#[derive(Debug, Clone)]
pub struct Joint {
    id: JointId,
    name: String,
    parent: Option<LinkId>,
    child: Option<LinkId>,
}

/// Joint handle owned by the model
pub type SharedJoint = Arc<RwLock<Joint>>;

impl Joint {
    pub fn new(id: JointId, name: impl Into<String>, parent: LinkId, child: LinkId) -> Self {
        Self {
            id,
            name: name.into(),
            parent: Some(parent),
            child: Some(child),
        }
    }

    /// Wrap into the shared form the model owns
    pub fn shared(self) -> SharedJoint {
        Arc::new(RwLock::new(self))
    }

    pub fn id(&self) -> JointId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<LinkId> {
        self.parent
    }

    pub fn child(&self) -> Option<LinkId> {
        self.child
    }

    /// The endpoint opposite to `link`, if `link` is an endpoint at all
    pub fn other_endpoint(&self, link: LinkId) -> Option<LinkId> {
        if self.parent == Some(link) {
            self.child
        } else if self.child == Some(link) {
            self.parent
        } else {
            None
        }
    }

    /// Forget `link` as an endpoint; called when that link is finalized
    pub(crate) fn release_endpoint(&mut self, link: LinkId) {
        if self.parent == Some(link) {
            self.parent = None;
        }
        if self.child == Some(link) {
            self.child = None;
        }
    }
}

/// Non-owning reference to a joint
#[derive(Clone)]
pub struct JointRef {
    id: JointId,
    joint: Weak<RwLock<Joint>>,
}

impl JointRef {
    pub fn new(joint: &SharedJoint) -> Self {
        Self {
            id: joint.read().id,
            joint: Arc::downgrade(joint),
        }
    }

    pub fn id(&self) -> JointId {
        self.id
    }

    pub fn upgrade(&self) -> Option<SharedJoint> {
        self.joint.upgrade()
    }

    /// Whether the owning model already dropped the joint
    pub fn is_dangling(&self) -> bool {
        self.joint.strong_count() == 0
    }

    /// Identity comparison
    pub fn refers_to(&self, joint: &SharedJoint) -> bool {
        Weak::ptr_eq(&self.joint, &Arc::downgrade(joint))
    }
}

impl PartialEq for JointRef {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.joint, &other.joint)
    }
}

impl fmt::Debug for JointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dangling() {
            write!(f, "JointRef({}, dangling)", self.id)
        } else {
            write!(f, "JointRef({})", self.id)
        }
    }
}

/// Which end of a joint a list records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointRole {
    /// Joints whose parent is the owning link
    Child,
    /// Joints whose child is the owning link
    Parent,
}

/// Ordered, duplicate-free list of joints on one side of a link
#[derive(Debug, Clone)]
pub struct JointList {
    role: JointRole,
    joints: Vec<JointRef>,
}

impl JointList {
    pub fn new(role: JointRole) -> Self {
        Self {
            role,
            joints: Vec::new(),
        }
    }

    pub fn role(&self) -> JointRole {
        self.role
    }

    /// Add a joint; returns `false` if it was already present
    pub fn add(&mut self, joint: &SharedJoint) -> bool {
        if self.contains(joint) {
            return false;
        }
        self.joints.push(JointRef::new(joint));
        true
    }

    /// Remove a joint by id; returns `false` if it was not present
    pub fn remove(&mut self, id: JointId) -> bool {
        let before = self.joints.len();
        self.joints.retain(|j| j.id != id);
        before != self.joints.len()
    }

    pub fn contains(&self, joint: &SharedJoint) -> bool {
        self.joints.iter().any(|j| j.refers_to(joint))
    }

    pub fn contains_id(&self, id: JointId) -> bool {
        self.joints.iter().any(|j| j.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JointRef> {
        self.joints.iter()
    }

    pub fn ids(&self) -> Vec<JointId> {
        self.joints.iter().map(JointRef::id).collect()
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Resolve the link at the far end of every joint.
    ///
    /// Fails on a joint the model already dropped, or whose far endpoint was
    /// finalized.
    pub fn neighbor_links(&self, owner: LinkId) -> Result<Vec<LinkId>> {
        self.joints
            .iter()
            .map(|joint_ref| {
                let joint = joint_ref.upgrade().ok_or_else(|| {
                    log::warn!("Link {owner} still lists dropped {}", joint_ref.id);
                    LinkError::DanglingJointReference(format!("{} was dropped", joint_ref.id))
                })?;
                let joint = joint.read();
                let far = match self.role {
                    JointRole::Child => joint.child,
                    JointRole::Parent => joint.parent,
                };
                far.ok_or_else(|| {
                    LinkError::DanglingJointReference(format!(
                        "{} '{}' has a finalized endpoint",
                        joint.id, joint.name
                    ))
                })
            })
            .collect()
    }

    /// Release `owner` as an endpoint of every live joint in the list
    pub(crate) fn release_endpoint(&self, owner: LinkId) {
        for joint in self.joints.iter().filter_map(JointRef::upgrade) {
            joint.write().release_endpoint(owner);
        }
    }
}
