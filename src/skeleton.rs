use serde::{Deserialize, Serialize};

use crate::error::{MotionMatchingError, Result};
use crate::transform::RigidTransform;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Joint {
    pub name: String,
    /// `None` only for joint 0, the trajectory joint.
    pub parent: Option<usize>,
    pub bind: RigidTransform,
}

/// Joints in topological order: every parent precedes its children.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Skeleton {
    pub joints: Vec<Joint>,
}

impl Skeleton {
    pub fn new(joints: Vec<Joint>) -> Result<Self> {
        let skeleton = Self { joints };
        skeleton.validate()?;
        Ok(skeleton)
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|joint| joint.name == name)
    }

    pub fn bind_pose(&self) -> Vec<RigidTransform> {
        self.joints.iter().map(|joint| joint.bind).collect()
    }

    pub fn validate(&self) -> Result<()> {
        let Some(root) = self.joints.first() else {
            return Err(MotionMatchingError::invalid_skeleton("no joints"));
        };
        if root.parent.is_some() {
            return Err(MotionMatchingError::invalid_skeleton(format!(
                "root joint '{}' has a parent",
                root.name
            )));
        }
        for (idx, joint) in self.joints.iter().enumerate().skip(1) {
            match joint.parent {
                Some(parent) if parent < idx => (),
                Some(parent) => {
                    return Err(MotionMatchingError::invalid_skeleton(format!(
                        "joint '{}' ({idx}) has parent {parent} which does not precede it",
                        joint.name
                    )))
                }
                None => {
                    return Err(MotionMatchingError::invalid_skeleton(format!(
                        "joint '{}' ({idx}) is a second root",
                        joint.name
                    )))
                }
            }
        }
        Ok(())
    }

    /// Transform of `joint` relative to joint 0, given local transforms for
    /// every joint. Joint 0's own transform is not applied.
    pub fn root_space_transform(&self, locals: &[RigidTransform], joint: usize) -> Result<RigidTransform> {
        let count = self.joints.len();
        if joint >= count {
            return Err(MotionMatchingError::UnknownJoint { joint, count });
        }
        if locals.len() != count {
            return Err(MotionMatchingError::FeatureLengthMismatch {
                group: "local pose",
                expected: count,
                actual: locals.len(),
            });
        }

        let mut acc = RigidTransform::IDENTITY;
        let mut idx = joint;
        while idx != 0 {
            acc = locals[idx] * acc;
            // validated topology: every non-root joint has a lower-index parent
            idx = self.joints[idx].parent.unwrap_or(0);
        }
        Ok(acc)
    }
}
