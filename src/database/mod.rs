//! Runtime pose database.
//!
//! Built offline (see [`builder::PoseDatabaseBuilder`]) and immutable
//! afterwards, so it is shared between the tick driver and the search
//! workers behind an `Arc` without any locking.

use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, Read, Write},
    ops::Range,
    path::Path,
};

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{
    error::{MotionMatchingError, Result},
    feature::FeatureVector,
    skeleton::Skeleton,
    transform::RigidTransform,
};

pub mod builder;
pub mod stride;

pub use builder::{AnimationSource, EventSource, PoseDatabaseBuilder};
pub use stride::{FrameTable, StrideTable};

/// Fractional frames closer than this to an integer frame sample it exactly.
const FRAME_SNAP: f32 = 1e-4;

/// Key into the database. Never owns pose data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoseIdentifier {
    pub animation: usize,
    pub frame: usize,
}

impl PoseIdentifier {
    pub const fn new(animation: usize, frame: usize) -> Self {
        Self { animation, frame }
    }
}

/// Animations are stored grouped by category, in this order.
#[derive(Serialize_repr, Deserialize_repr, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Category {
    Motion = 0,
    Idle = 1,
    Event = 2,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationInfo {
    pub name: String,
    pub category: Category,
    pub frame_count: usize,
}

/// Phase frames of an event clip. `prepare <= begin <= recovery <= finish`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventClip {
    pub event_id: u32,
    pub animation: usize,
    pub prepare_frame: usize,
    pub begin_frame: usize,
    pub recovery_frame: usize,
    pub finish_frame: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoseDatabase {
    pub(crate) frame_rate: f32,
    pub(crate) skeleton: Skeleton,
    /// Sorted ascending: negative (past) offsets first, then positive (future).
    pub(crate) trajectory_offsets: Vec<f32>,
    pub(crate) compared_joints: Vec<usize>,
    pub(crate) animations: Vec<AnimationInfo>,
    pub(crate) events: Vec<EventClip>,
    pub(crate) strides: StrideTable,
    pub(crate) poses: FrameTable<RigidTransform>,
    pub(crate) trajectories: FrameTable<RigidTransform>,
    pub(crate) joint_features: FrameTable<RigidTransform>,
}

/// Splits `time` (seconds) into two neighbouring frames and a blend factor.
/// Time is clamped to the clip, there is no wraparound.
pub(crate) fn frame_pair(frame_count: usize, frame_rate: f32, time: f32) -> (usize, usize, f32) {
    let last = frame_count.saturating_sub(1);
    let frame = time * frame_rate;
    if !frame.is_finite() || frame <= 0.0 {
        return (0, 0, 0.0);
    }
    let frame = frame.min(last as f32);
    let nearest = frame.round();
    if (frame - nearest).abs() < FRAME_SNAP {
        let f = nearest as usize;
        return (f, f, 0.0);
    }
    let f0 = frame.floor() as usize;
    let f1 = (f0 + 1).min(last);
    (f0, f1, frame - f0 as f32)
}

impl PoseDatabase {
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let database: PoseDatabase = serde_json::from_reader(reader)?;
        database.validate()?;
        log::info!(
            "loaded pose database: {} animations, {} frames, {} joints",
            database.animations.len(),
            database.strides.total_frames(),
            database.skeleton.joint_count()
        );
        Ok(database)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_json_reader(BufReader::new(file))
    }

    pub fn to_json_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Checks every layout invariant. Run on build and on load.
    pub fn validate(&self) -> Result<()> {
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Err(MotionMatchingError::invalid_database(format!(
                "frame rate {} is not positive",
                self.frame_rate
            )));
        }
        self.skeleton.validate()?;

        if self.trajectory_offsets.iter().any(|o| !o.is_finite() || *o == 0.0) {
            return Err(MotionMatchingError::invalid_database(
                "trajectory offsets must be finite and non-zero",
            ));
        }
        if self.trajectory_offsets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MotionMatchingError::invalid_database(
                "trajectory offsets must be strictly ascending",
            ));
        }
        let joint_count = self.skeleton.joint_count();
        if let Some(&joint) = self.compared_joints.iter().find(|j| **j >= joint_count) {
            return Err(MotionMatchingError::UnknownJoint {
                joint,
                count: joint_count,
            });
        }

        if self.animations.is_empty() {
            return Err(MotionMatchingError::invalid_database("no animations"));
        }
        if let Some(anim) = self.animations.iter().find(|a| a.frame_count == 0) {
            return Err(MotionMatchingError::invalid_database(format!(
                "animation '{}' has no frames",
                anim.name
            )));
        }
        if self.animations.windows(2).any(|w| w[0].category > w[1].category) {
            return Err(MotionMatchingError::invalid_database(
                "animations are not grouped by category",
            ));
        }
        let frame_counts: Vec<usize> = self.animations.iter().map(|a| a.frame_count).collect();
        if self.strides != StrideTable::from_frame_counts(&frame_counts) {
            return Err(MotionMatchingError::invalid_database(
                "stride table disagrees with animation frame counts",
            ));
        }

        check_stride("pose", self.poses.stride(), joint_count)?;
        check_stride("trajectory", self.trajectories.stride(), self.trajectory_offsets.len())?;
        check_stride("joint feature", self.joint_features.stride(), self.compared_joints.len())?;
        self.poses.check("pose", &self.strides)?;
        self.trajectories.check("trajectory", &self.strides)?;
        self.joint_features.check("joint feature", &self.strides)?;

        let mut event_ids = HashSet::with_capacity(self.events.len());
        for event in &self.events {
            if !event_ids.insert(event.event_id) {
                return Err(MotionMatchingError::invalid_database(format!(
                    "event id {} is used more than once",
                    event.event_id
                )));
            }
            let anim = self.animation(event.animation)?;
            if anim.category != Category::Event {
                return Err(MotionMatchingError::invalid_database(format!(
                    "event {} points at non-event animation '{}'",
                    event.event_id, anim.name
                )));
            }
            let ordered = event.prepare_frame <= event.begin_frame
                && event.begin_frame <= event.recovery_frame
                && event.recovery_frame <= event.finish_frame
                && event.finish_frame < anim.frame_count;
            if !ordered {
                return Err(MotionMatchingError::invalid_database(format!(
                    "event {} phase frames are out of order or out of range",
                    event.event_id
                )));
            }
        }
        Ok(())
    }

    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn joints_per_frame(&self) -> usize {
        self.poses.stride()
    }

    pub fn trajectory_offsets(&self) -> &[f32] {
        &self.trajectory_offsets
    }

    /// Number of past (negative) trajectory offsets. They come first in
    /// every trajectory group.
    pub fn past_count(&self) -> usize {
        self.trajectory_offsets.partition_point(|o| *o < 0.0)
    }

    pub fn future_count(&self) -> usize {
        self.trajectory_offsets.len() - self.past_count()
    }

    pub fn past_offsets(&self) -> &[f32] {
        &self.trajectory_offsets[..self.past_count()]
    }

    pub fn future_offsets(&self) -> &[f32] {
        &self.trajectory_offsets[self.past_count()..]
    }

    pub fn compared_joints(&self) -> &[usize] {
        &self.compared_joints
    }

    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }

    pub fn animation(&self, id: usize) -> Result<&AnimationInfo> {
        self.animations.get(id).ok_or(MotionMatchingError::UnknownAnimation {
            id,
            count: self.animations.len(),
        })
    }

    pub fn animations(&self) -> &[AnimationInfo] {
        &self.animations
    }

    pub fn frame_count(&self, id: usize) -> Result<usize> {
        self.strides.frame_count(id)
    }

    /// Time of the clip's last frame.
    pub fn clip_duration(&self, id: usize) -> Result<f32> {
        Ok((self.frame_count(id)? - 1) as f32 / self.frame_rate)
    }

    /// Half-open range of animation ids in `category`. Empty if the category
    /// has no animations.
    pub fn category_range(&self, category: Category) -> Range<usize> {
        let start = self.animations.partition_point(|a| a.category < category);
        let end = self.animations.partition_point(|a| a.category <= category);
        start..end
    }

    pub fn events(&self) -> &[EventClip] {
        &self.events
    }

    pub fn event(&self, event_id: u32) -> Result<&EventClip> {
        self.events
            .iter()
            .find(|e| e.event_id == event_id)
            .ok_or(MotionMatchingError::UnknownEvent(event_id))
    }

    /// Stored transform of `joint` at `id`. The frame is clamped into the clip.
    pub fn pose_transform(&self, id: PoseIdentifier, joint: usize) -> Result<RigidTransform> {
        self.poses.get(&self.strides, id, joint).copied()
    }

    /// Every joint of `id`, frame clamped.
    pub fn pose(&self, id: PoseIdentifier) -> Result<&[RigidTransform]> {
        self.poses.group(&self.strides, id)
    }

    pub fn interpolated_transform(&self, animation: usize, time: f32, joint: usize) -> Result<RigidTransform> {
        let (f0, f1, alpha) = frame_pair(self.frame_count(animation)?, self.frame_rate, time);
        let a = self.pose_transform(PoseIdentifier::new(animation, f0), joint)?;
        if f0 == f1 {
            return Ok(a);
        }
        let b = self.pose_transform(PoseIdentifier::new(animation, f1), joint)?;
        Ok(a.interpolate(&b, alpha))
    }

    /// Samples every joint at `time`, writing into `out`.
    pub fn sample_pose(&self, animation: usize, time: f32, out: &mut Vec<RigidTransform>) -> Result<()> {
        let (f0, f1, alpha) = frame_pair(self.frame_count(animation)?, self.frame_rate, time);
        out.clear();
        let a = self.pose(PoseIdentifier::new(animation, f0))?;
        if f0 == f1 {
            out.extend_from_slice(a);
            return Ok(());
        }
        let b = self.pose(PoseIdentifier::new(animation, f1))?;
        out.extend(a.iter().zip(b).map(|(a, b)| a.interpolate(b, alpha)));
        Ok(())
    }

    pub fn feature_vector(&self, id: PoseIdentifier) -> Result<FeatureVector<'_>> {
        let frame_count = self.frame_count(id.animation)?;
        let id = PoseIdentifier::new(id.animation, id.frame.min(frame_count - 1));
        Ok(FeatureVector {
            pose: id,
            trajectory: self.trajectories.group(&self.strides, id)?,
            joints: self.joint_features.group(&self.strides, id)?,
        })
    }

    /// Frames `0..n` of `animation` that still have `horizon` seconds of
    /// clip after them.
    pub fn playable_frames(&self, animation: usize, horizon: f32) -> Result<Range<usize>> {
        let count = self.frame_count(animation)?;
        let last = (count - 1) as f32;
        let newest = last - horizon.max(0.0) * self.frame_rate;
        if newest < -FRAME_SNAP {
            return Ok(0..0);
        }
        let end = ((newest + FRAME_SNAP).floor() as usize + 1).min(count);
        Ok(0..end)
    }

    /// Lazily lists the candidate poses of `category`. Restartable by cloning.
    pub fn candidates(&self, category: Category, horizon: f32) -> impl Iterator<Item = PoseIdentifier> + Clone + '_ {
        self.category_range(category).flat_map(move |animation| {
            // ids come from the category range, so the lookup cannot fail
            let frames = self.playable_frames(animation, horizon).unwrap_or(0..0);
            frames.map(move |frame| PoseIdentifier::new(animation, frame))
        })
    }

    pub fn feature_vectors(&self, category: Category, horizon: f32) -> impl Iterator<Item = FeatureVector<'_>> + Clone + '_ {
        self.candidates(category, horizon)
            .filter_map(move |id| self.feature_vector(id).ok())
    }

    /// Candidates of one event clip, limited to its prepare..=begin frames.
    pub fn event_candidates(&self, event_id: u32, horizon: f32) -> Result<impl Iterator<Item = PoseIdentifier> + Clone + '_> {
        let event = *self.event(event_id)?;
        let playable = self.playable_frames(event.animation, horizon)?;
        let end = playable.end.min(event.begin_frame + 1);
        Ok((event.prepare_frame..end).map(move |frame| PoseIdentifier::new(event.animation, frame)))
    }

    pub fn event_feature_vectors(&self, event_id: u32, horizon: f32) -> Result<impl Iterator<Item = FeatureVector<'_>> + Clone + '_> {
        Ok(self
            .event_candidates(event_id, horizon)?
            .filter_map(move |id| self.feature_vector(id).ok()))
    }
}

fn check_stride(table: &'static str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(MotionMatchingError::StrideMismatch {
            table,
            expected,
            actual,
        });
    }
    Ok(())
}
