use serde::{Deserialize, Serialize};

use crate::{feature::{FeatureVector, QueryFeatures}, transform::RigidTransform};

/// Weights of the matching cost:
///
/// `trajectory * (future * future_cost + past * past_cost) + (1 - trajectory) * pose_cost`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    pub trajectory: f32,
    pub future: f32,
    pub past: f32,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            trajectory: 0.45,
            future: 0.8,
            past: 0.2,
        }
    }
}

/// `(future, past)` trajectory costs. Future points also pay for heading
/// difference, normalized so a half-turn costs 1.
pub fn trajectory_costs(query: &[RigidTransform], candidate: &[RigidTransform], past_count: usize) -> (f32, f32) {
    let mut future = 0.0;
    let mut past = 0.0;
    for (idx, (q, c)) in query.iter().zip(candidate).enumerate() {
        let distance = q.translation.distance(c.translation);
        if idx < past_count {
            past += distance;
        } else {
            future += distance + q.angle_to_degrees(c) / 180.0;
        }
    }
    (future, past)
}

pub fn pose_cost(query: &[RigidTransform], candidate: &[RigidTransform]) -> f32 {
    query
        .iter()
        .zip(candidate)
        .map(|(q, c)| q.translation.distance(c.translation))
        .sum()
}

pub fn feature_cost(query: &QueryFeatures, candidate: &FeatureVector<'_>, past_count: usize, weights: &CostWeights) -> f32 {
    let (future, past) = trajectory_costs(&query.trajectory, candidate.trajectory, past_count);
    let pose = pose_cost(&query.joints, candidate.joints);
    weights.trajectory * (weights.future * future + weights.past * past) + (1.0 - weights.trajectory) * pose
}
