use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::{MotionMatchingError, Result},
    search::CostWeights,
};

fn default_update_interval() -> f32 { 0.1 }
fn default_blend_duration() -> f32 { 0.3 }
fn default_search_horizon() -> f32 { 0.5 }
fn default_batch_size() -> usize { 32 }
fn default_worker_count() -> usize { 4 }
fn default_same_pose_frame_tolerance() -> usize { 3 }
fn default_future_time_tolerance() -> f32 { 1e-3 }

/// Runtime tuning of the matcher. Every field has a default, so an empty
/// JSON object is a valid config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionMatchingConfig {
    /// Seconds between two searches.
    #[serde(default = "default_update_interval")]
    pub update_interval: f32,
    #[serde(default = "default_blend_duration")]
    pub blend_duration: f32,
    /// Seconds of clip a candidate frame must still have after it.
    #[serde(default = "default_search_horizon")]
    pub search_horizon: f32,
    #[serde(default)]
    pub weights: CostWeights,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// A winner this close to the playhead of the running clip is ignored.
    #[serde(default = "default_same_pose_frame_tolerance")]
    pub same_pose_frame_tolerance: usize,
    #[serde(default = "default_future_time_tolerance")]
    pub future_time_tolerance: f32,
}

impl Default for MotionMatchingConfig {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
            blend_duration: default_blend_duration(),
            search_horizon: default_search_horizon(),
            weights: CostWeights::default(),
            batch_size: default_batch_size(),
            worker_count: default_worker_count(),
            same_pose_frame_tolerance: default_same_pose_frame_tolerance(),
            future_time_tolerance: default_future_time_tolerance(),
        }
    }
}

impl MotionMatchingConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("update_interval", self.update_interval),
            ("blend_duration", self.blend_duration),
            ("search_horizon", self.search_horizon),
            ("future_time_tolerance", self.future_time_tolerance),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(MotionMatchingError::invalid_config(format!("{name} must be a non-negative number, got {value}")));
            }
        }
        if self.batch_size == 0 {
            return Err(MotionMatchingError::invalid_config("batch_size must be positive"));
        }
        if self.worker_count == 0 {
            return Err(MotionMatchingError::invalid_config("worker_count must be positive"));
        }
        let w = &self.weights;
        for (name, value) in [("trajectory", w.trajectory), ("future", w.future), ("past", w.past)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MotionMatchingError::invalid_config(format!("weight {name} must be in [0, 1], got {value}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = MotionMatchingConfig::from_json_str("{}").unwrap();
        assert_eq!(config, MotionMatchingConfig::default());
        assert_eq!(config.weights.trajectory, 0.45);
    }

    #[test]
    fn partial_weights_keep_other_defaults() {
        let config = MotionMatchingConfig::from_json_str(r#"{ "weights": { "trajectory": 0.6 }, "batch_size": 8 }"#).unwrap();
        assert_eq!(config.weights.trajectory, 0.6);
        assert_eq!(config.weights.future, 0.8);
        assert_eq!(config.batch_size, 8);
    }

    #[test]
    fn rejects_zero_batch_size() {
        let err = MotionMatchingConfig::from_json_str(r#"{ "batch_size": 0 }"#).unwrap_err();
        assert!(matches!(err, MotionMatchingError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_weight_out_of_range() {
        let err = MotionMatchingConfig::from_json_str(r#"{ "weights": { "past": 1.5 } }"#).unwrap_err();
        assert!(matches!(err, MotionMatchingError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_negative_interval() {
        let mut config = MotionMatchingConfig::default();
        config.update_interval = -0.1;
        assert!(config.validate().is_err());
    }
}
