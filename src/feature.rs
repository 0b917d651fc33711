use serde::{Deserialize, Serialize};

use crate::{
    database::{PoseDatabase, PoseIdentifier},
    error::{MotionMatchingError, Result},
    transform::RigidTransform,
};

/// A candidate's features, borrowed from the database.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureVector<'a> {
    pub pose: PoseIdentifier,
    /// Past points first, then future points, in offset order.
    pub trajectory: &'a [RigidTransform],
    /// Root-space transforms of the compared joints.
    pub joints: &'a [RigidTransform],
}

/// A future trajectory point supplied by the gameplay controller, local to
/// the character root.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub time_offset: f32,
    pub transform: RigidTransform,
}

/// The live query, assembled fresh for every search.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryFeatures {
    /// Pose playing when the query was assembled, if any.
    pub current: Option<PoseIdentifier>,
    pub trajectory: Vec<RigidTransform>,
    pub joints: Vec<RigidTransform>,
}

impl QueryFeatures {
    pub fn new(trajectory: Vec<RigidTransform>, joints: Vec<RigidTransform>) -> Self {
        Self {
            current: None,
            trajectory,
            joints,
        }
    }

    /// Copies a database feature vector, e.g. to search for a known pose.
    pub fn from_candidate(candidate: &FeatureVector<'_>) -> Self {
        Self {
            current: Some(candidate.pose),
            trajectory: candidate.trajectory.to_vec(),
            joints: candidate.joints.to_vec(),
        }
    }

    /// Joins recorded past points with the caller's future points.
    /// `future` must hold exactly one point per future offset of the database;
    /// timestamps further than `time_tolerance` from their offset only warn.
    pub fn assemble(
        database: &PoseDatabase,
        past: &[RigidTransform],
        future: &[TrajectoryPoint],
        joints: Vec<RigidTransform>,
        time_tolerance: f32,
    ) -> Result<Self> {
        check_len("past trajectory", database.past_count(), past.len())?;
        check_len("future trajectory", database.future_count(), future.len())?;

        for (point, offset) in future.iter().zip(database.future_offsets()) {
            if (point.time_offset - offset).abs() > time_tolerance {
                log::warn!(
                    "future trajectory point at {}s used for offset {}s",
                    point.time_offset,
                    offset
                );
            }
        }

        let mut trajectory = Vec::with_capacity(past.len() + future.len());
        trajectory.extend_from_slice(past);
        trajectory.extend(future.iter().map(|p| p.transform));
        let query = Self::new(trajectory, joints);
        query.check(database)?;
        Ok(query)
    }

    /// Group lengths must match the database strides exactly.
    pub fn check(&self, database: &PoseDatabase) -> Result<()> {
        check_len("trajectory", database.trajectory_offsets().len(), self.trajectory.len())?;
        check_len("joint", database.compared_joints().len(), self.joints.len())
    }
}

fn check_len(group: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(MotionMatchingError::FeatureLengthMismatch {
            group,
            expected,
            actual,
        });
    }
    Ok(())
}
