//! Rolling root history resampled onto fixed time offsets.
//!
//! Every tick ages the stored samples, and a sample crossing one of the
//! target lags updates that lag's slot. Slots are therefore refreshed by
//! events rather than by a full resample every tick.

use std::collections::VecDeque;

use crate::{
    error::{MotionMatchingError, Result},
    feature::TrajectoryPoint,
    transform::RigidTransform,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderDirection {
    /// Negative offsets. Slots hold where the root was, seen from now.
    Past,
    /// Positive offsets. Slots hold where the root is now, seen from the
    /// root `offset` seconds ago.
    Post,
}

#[derive(Clone, Copy, Debug)]
struct Sample {
    age: f32,
    transform: RigidTransform,
}

#[derive(Clone, Debug)]
pub struct TrajectoryRecorder {
    direction: RecorderDirection,
    offsets: Vec<f32>,
    /// `|offset|`, parallel to `offsets`
    lags: Vec<f32>,
    slots: Vec<RigidTransform>,
    /// oldest first
    history: VecDeque<Sample>,
    max_lag: f32,
}

impl TrajectoryRecorder {
    pub fn past(offsets: &[f32], initial: RigidTransform) -> Result<Self> {
        if offsets.iter().any(|o| !(*o < 0.0)) {
            return Err(MotionMatchingError::invalid_config("past offsets must be negative"));
        }
        Self::new(RecorderDirection::Past, offsets, initial)
    }

    pub fn post(offsets: &[f32], initial: RigidTransform) -> Result<Self> {
        if offsets.iter().any(|o| !(*o > 0.0)) {
            return Err(MotionMatchingError::invalid_config("post offsets must be positive"));
        }
        Self::new(RecorderDirection::Post, offsets, initial)
    }

    fn new(direction: RecorderDirection, offsets: &[f32], initial: RigidTransform) -> Result<Self> {
        if offsets.iter().any(|o| !o.is_finite()) {
            return Err(MotionMatchingError::invalid_config("trajectory offsets must be finite"));
        }
        let lags: Vec<f32> = offsets.iter().map(|o| o.abs()).collect();
        let max_lag = lags.iter().copied().fold(0.0, f32::max);
        let mut history = VecDeque::new();
        history.push_back(Sample {
            age: 0.0,
            transform: initial,
        });
        Ok(Self {
            direction,
            offsets: offsets.to_vec(),
            lags,
            slots: vec![RigidTransform::IDENTITY; offsets.len()],
            history,
            max_lag,
        })
    }

    pub fn direction(&self) -> RecorderDirection {
        self.direction
    }

    pub fn offsets(&self) -> &[f32] {
        &self.offsets
    }

    /// One local-space transform per offset, in offset order.
    pub fn trajectory(&self) -> &[RigidTransform] {
        &self.slots
    }

    pub fn points(&self) -> impl Iterator<Item = TrajectoryPoint> + '_ {
        self.offsets
            .iter()
            .zip(&self.slots)
            .map(|(offset, transform)| TrajectoryPoint {
                time_offset: *offset,
                transform: *transform,
            })
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn record(&mut self, current: RigidTransform, dt: f32) {
        let dt = dt.max(0.0);
        let current_inv = current.inverse();

        for sample in self.history.iter_mut() {
            let before = sample.age;
            sample.age += dt;
            for (slot, lag) in self.slots.iter_mut().zip(&self.lags) {
                if before < *lag && sample.age >= *lag {
                    *slot = match self.direction {
                        RecorderDirection::Past => current_inv * sample.transform,
                        RecorderDirection::Post => sample.transform.inverse() * current,
                    };
                }
            }
        }

        while self.history.front().is_some_and(|s| s.age > self.max_lag) {
            self.history.pop_front();
        }

        self.history.push_back(Sample {
            age: 0.0,
            transform: current,
        });
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn at_z(z: f32) -> RigidTransform {
        RigidTransform::from_translation(Vec3::Z * z)
    }

    #[test]
    fn past_slots_follow_constant_walk() {
        let mut recorder = TrajectoryRecorder::past(&[-0.5, -0.25], at_z(0.0)).unwrap();
        let dt = 0.05;
        // 1 unit per second along +Z
        for tick in 1..=20 {
            recorder.record(at_z(tick as f32 * dt), dt);
        }
        let traj = recorder.trajectory();
        assert!(traj[0].translation.abs_diff_eq(Vec3::Z * -0.5, 0.06));
        assert!(traj[1].translation.abs_diff_eq(Vec3::Z * -0.25, 0.06));
    }

    #[test]
    fn history_is_pruned_past_the_oldest_offset() {
        let mut recorder = TrajectoryRecorder::past(&[-0.2], at_z(0.0)).unwrap();
        for _ in 0..100 {
            recorder.record(at_z(0.0), 0.01);
        }
        // samples up to 0.2s old, plus the fresh one
        assert!(recorder.history_len() <= 22);
        assert_eq!(recorder.trajectory().len(), 1);
    }

    #[test]
    fn post_recorder_reports_travel_since_offset() {
        let mut recorder = TrajectoryRecorder::post(&[0.3], at_z(0.0)).unwrap();
        for tick in 1..=10 {
            recorder.record(at_z(tick as f32 * 0.1), 0.1);
        }
        let point = recorder.points().next().unwrap();
        assert_eq!(point.time_offset, 0.3);
        assert!(point.transform.translation.abs_diff_eq(Vec3::Z * 0.3, 0.11));
    }

    #[test]
    fn offsets_must_match_direction() {
        assert!(TrajectoryRecorder::past(&[0.5], RigidTransform::IDENTITY).is_err());
        assert!(TrajectoryRecorder::post(&[-0.5], RigidTransform::IDENTITY).is_err());
    }

    #[test]
    fn slot_count_is_fixed() {
        let mut recorder = TrajectoryRecorder::past(&[-1.0, -0.5, -0.1], RigidTransform::IDENTITY).unwrap();
        for _ in 0..50 {
            recorder.record(RigidTransform::IDENTITY, 0.033);
            assert_eq!(recorder.trajectory().len(), 3);
        }
    }
}
