//! Owning model: links, joints and teardown ordering
//!
//! The model is the single owner of every joint. Links only see joints
//! through weak references, so the model is also where joint membership is
//! kept symmetric: a joint from `P` to `C` is always in `P`'s child joints
//! and `C`'s parent joints, or in neither.

use crate::backend::LinkBackend;
use crate::description::LinkDesc;
use crate::error::{LinkError, Result};
use crate::joint::{Joint, JointId, SharedJoint};
use crate::link::{Link, LinkId, LinkPhase};
use crate::state::StepInfo;
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Link handle owned by the model
pub type SharedLink = Arc<RwLock<Link>>;

/// A collection of links connected by joints
#[derive(Debug)]
pub struct Model {
    name: String,
    links: Vec<SharedLink>,
    joints: Vec<SharedJoint>,
    next_link_id: u32,
    next_joint_id: u32,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            links: Vec::new(),
            joints: Vec::new(),
            next_link_id: 0,
            next_joint_id: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create and load a link; link names are unique within a model
    pub fn create_link(&mut self, desc: &LinkDesc, backend: Box<dyn LinkBackend>) -> Result<SharedLink> {
        if self.link_by_name(&desc.name).is_some() {
            return Err(LinkError::DuplicateName(desc.name.clone()));
        }

        let id = LinkId(self.next_link_id);
        let mut link = Link::new(id, backend);
        link.load(desc)?;
        self.next_link_id += 1;

        let link = Arc::new(RwLock::new(link));
        self.links.push(link.clone());
        Ok(link)
    }

    /// Initialize every link that is loaded but not yet initialized
    pub fn init(&self) -> Result<()> {
        for link in &self.links {
            let mut link = link.write();
            if link.phase() == LinkPhase::Loaded {
                link.init()?;
            }
        }
        log::info!("Initialized model '{}' ({} links)", self.name, self.links.len());
        Ok(())
    }

    pub fn link(&self, id: LinkId) -> Option<SharedLink> {
        self.links.iter().find(|l| l.read().id() == id).cloned()
    }

    pub fn link_by_name(&self, name: &str) -> Option<SharedLink> {
        self.links.iter().find(|l| l.read().name() == name).cloned()
    }

    pub fn links(&self) -> &[SharedLink] {
        &self.links
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn joint(&self, id: JointId) -> Option<SharedJoint> {
        self.joints.iter().find(|j| j.read().id() == id).cloned()
    }

    pub fn joints(&self) -> &[SharedJoint] {
        &self.joints
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Connect `parent` to `child`, registering the joint on both links
    pub fn create_joint(&mut self, name: impl Into<String>, parent: LinkId, child: LinkId) -> Result<SharedJoint> {
        if parent == child {
            return Err(LinkError::InvalidArgument(format!("{parent} cannot be jointed to itself")));
        }
        let parent_link = self
            .link(parent)
            .ok_or_else(|| LinkError::InvalidArgument(format!("no {parent} in model '{}'", self.name)))?;
        let child_link = self
            .link(child)
            .ok_or_else(|| LinkError::InvalidArgument(format!("no {child} in model '{}'", self.name)))?;

        let joint = Joint::new(JointId(self.next_joint_id), name, parent, child).shared();
        parent_link.write().add_child_joint(&joint)?;
        if let Err(err) = child_link.write().add_parent_joint(&joint) {
            parent_link.write().remove_child_joint(joint.read().id());
            return Err(err);
        }

        self.next_joint_id += 1;
        log::debug!("Joint '{}' connects {parent} -> {child}", joint.read().name());
        self.joints.push(joint.clone());
        Ok(joint)
    }

    /// Remove a joint from both endpoints and drop it; `false` if unknown
    pub fn remove_joint(&mut self, id: JointId) -> bool {
        let Some(index) = self.joints.iter().position(|j| j.read().id() == id) else {
            return false;
        };
        let joint = self.joints.remove(index);
        let (parent, child) = {
            let joint = joint.read();
            (joint.parent(), joint.child())
        };
        if let Some(link) = parent.and_then(|link_id| self.link(link_id)) {
            link.write().remove_child_joint(id);
        }
        if let Some(link) = child.and_then(|link_id| self.link(link_id)) {
            link.write().remove_parent_joint(id);
        }
        true
    }

    /// Strip every joint of a link, finalize it and drop it
    pub fn remove_link(&mut self, id: LinkId) -> Result<bool> {
        let Some(index) = self.links.iter().position(|l| l.read().id() == id) else {
            return Ok(false);
        };

        let attached: Vec<JointId> = self
            .joints
            .iter()
            .filter(|j| {
                let joint = j.read();
                joint.parent() == Some(id) || joint.child() == Some(id)
            })
            .map(|j| j.read().id())
            .collect();
        for joint in attached {
            self.remove_joint(joint);
        }

        let link = self.links.remove(index);
        link.write().fini()?;
        log::debug!("Removed {id} from model '{}'", self.name);
        Ok(true)
    }

    /// Update every initialized link after an engine step
    pub fn step_links(&self, step: &StepInfo) -> Result<()> {
        for link in &self.links {
            let mut link = link.write();
            if link.phase() == LinkPhase::Initialized {
                link.update(step)?;
            }
        }
        Ok(())
    }

    /// Every link reachable from `root` through child joints, breadth first
    pub fn descendants(&self, root: LinkId) -> Result<Vec<LinkId>> {
        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            let link = self
                .link(current)
                .ok_or_else(|| LinkError::DanglingJointReference(format!("{current} is not in the model")))?;
            let children = link.read().child_joints_links()?;
            for child in children {
                if visited.insert(child) {
                    found.push(child);
                    queue.push_back(child);
                }
            }
        }
        Ok(found)
    }

    /// Drop every joint, then finalize every link
    pub fn fini(&mut self) -> Result<()> {
        let joints: Vec<JointId> = self.joints.iter().map(|j| j.read().id()).collect();
        for joint in joints {
            self.remove_joint(joint);
        }
        for link in &self.links {
            link.write().fini()?;
        }
        log::info!("Finalized model '{}'", self.name);
        Ok(())
    }
}
