//! Static models rigidly following a link

use crate::math::Pose;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// A non-dynamic model whose pose is driven by whatever it is attached to
#[derive(Debug, Clone)]
pub struct StaticModel {
    name: String,
    pose: Pose,
}

/// Static model handle owned outside the link
pub type SharedStaticModel = Arc<RwLock<StaticModel>>;

impl StaticModel {
    pub fn new(name: impl Into<String>, pose: Pose) -> Self {
        Self {
            name: name.into(),
            pose,
        }
    }

    pub fn shared(self) -> SharedStaticModel {
        Arc::new(RwLock::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// World pose
    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }
}

/// Attached static models and their offsets.
///
/// `offsets[i]` belongs to `models[i]`; both sequences always change together.
#[derive(Debug, Default)]
pub struct StaticAttachments {
    offsets: Vec<Pose>,
    models: Vec<Weak<RwLock<StaticModel>>>,
}

impl StaticAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach (or re-offset) a model and snap it to `link_pose * offset`
    pub fn attach(&mut self, model: &SharedStaticModel, offset: Pose, link_pose: &Pose) {
        let weak = Arc::downgrade(model);
        match self.models.iter().position(|m| Weak::ptr_eq(m, &weak)) {
            Some(index) => self.offsets[index] = offset,
            None => {
                self.offsets.push(offset);
                self.models.push(weak);
            }
        }
        model.write().set_pose(link_pose * offset);
    }

    /// Detach the model with the given name; returns `false` if none matched
    pub fn detach(&mut self, name: &str) -> bool {
        let index = self.models.iter().position(|m| {
            m.upgrade()
                .map(|model| model.read().name == name)
                .unwrap_or(false)
        });
        match index {
            Some(index) => {
                self.offsets.remove(index);
                self.models.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn detach_all(&mut self) {
        self.offsets.clear();
        self.models.clear();
    }

    /// Move every live model to `link_pose * offset`, dropping dead entries
    pub fn update(&mut self, link_pose: &Pose) {
        let mut index = 0;
        while index < self.models.len() {
            match self.models[index].upgrade() {
                Some(model) => {
                    model.write().set_pose(link_pose * self.offsets[index]);
                    index += 1;
                }
                None => {
                    log::debug!("Dropping attachment to a static model that no longer exists");
                    self.offsets.remove(index);
                    self.models.remove(index);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.offsets.len(), self.models.len());
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn offset(&self, index: usize) -> Option<&Pose> {
        self.offsets.get(index)
    }

    /// Names of the attached models that are still alive, in attachment order
    pub fn names(&self) -> Vec<String> {
        self.models
            .iter()
            .filter_map(Weak::upgrade)
            .map(|model| model.read().name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
    use approx::assert_relative_eq;

    #[test]
    fn test_attach_snaps_pose() {
        let model = StaticModel::new("crate", Pose::identity()).shared();
        let mut attachments = StaticAttachments::new();

        attachments.attach(&model, Pose::translation(0.0, 0.0, 1.0), &Pose::translation(2.0, 0.0, 0.0));
        assert_relative_eq!(model.read().pose().translation.vector, Vec3::new(2.0, 0.0, 1.0));
    }

    #[test]
    fn test_reattach_updates_offset() {
        let model = StaticModel::new("crate", Pose::identity()).shared();
        let mut attachments = StaticAttachments::new();

        attachments.attach(&model, Pose::translation(1.0, 0.0, 0.0), &Pose::identity());
        attachments.attach(&model, Pose::translation(0.0, 1.0, 0.0), &Pose::identity());

        assert_eq!(attachments.len(), 1);
        assert_relative_eq!(attachments.offset(0).unwrap().translation.vector, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_detach_and_prune() {
        let kept = StaticModel::new("kept", Pose::identity()).shared();
        let mut attachments = StaticAttachments::new();
        attachments.attach(&kept, Pose::identity(), &Pose::identity());
        {
            let dropped = StaticModel::new("dropped", Pose::identity()).shared();
            attachments.attach(&dropped, Pose::identity(), &Pose::identity());
        }

        attachments.update(&Pose::translation(1.0, 0.0, 0.0));
        assert_eq!(attachments.names(), vec!["kept".to_string()]);

        assert!(!attachments.detach("missing"));
        assert!(attachments.detach("kept"));
        assert!(attachments.is_empty());
    }
}
