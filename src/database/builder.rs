use crate::{
    error::{MotionMatchingError, Result},
    skeleton::Skeleton,
    transform::RigidTransform,
};

use super::{frame_pair, AnimationInfo, Category, EventClip, FrameTable, PoseDatabase, StrideTable};

/// One baked clip: local joint transforms per frame, sampled at the
/// database frame rate.
#[derive(Clone, Debug)]
pub struct AnimationSource {
    pub name: String,
    pub category: Category,
    pub frames: Vec<Vec<RigidTransform>>,
}

/// Event phases, keyed by animation name since ids change when the builder
/// groups animations by category.
#[derive(Clone, Debug)]
pub struct EventSource {
    pub event_id: u32,
    pub animation: String,
    pub prepare_frame: usize,
    pub begin_frame: usize,
    pub recovery_frame: usize,
    pub finish_frame: usize,
}

pub struct PoseDatabaseBuilder {
    skeleton: Skeleton,
    frame_rate: f32,
    trajectory_offsets: Vec<f32>,
    compared_joints: Vec<usize>,
    animations: Vec<AnimationSource>,
    events: Vec<EventSource>,
}

impl PoseDatabaseBuilder {
    pub fn new(skeleton: Skeleton, frame_rate: f32) -> Self {
        Self {
            skeleton,
            frame_rate,
            trajectory_offsets: vec![],
            compared_joints: vec![],
            animations: vec![],
            events: vec![],
        }
    }

    pub fn with_trajectory_offsets(mut self, mut offsets: Vec<f32>) -> Self {
        offsets.sort_by(f32::total_cmp);
        self.trajectory_offsets = offsets;
        self
    }

    pub fn with_compared_joints(mut self, joints: Vec<usize>) -> Self {
        self.compared_joints = joints;
        self
    }

    pub fn add_animation(&mut self, source: AnimationSource) -> &mut Self {
        self.animations.push(source);
        self
    }

    pub fn add_event(&mut self, event: EventSource) -> &mut Self {
        self.events.push(event);
        self
    }

    pub fn build(self) -> Result<PoseDatabase> {
        let Self {
            skeleton,
            frame_rate,
            trajectory_offsets,
            compared_joints,
            mut animations,
            events,
        } = self;
        skeleton.validate()?;
        let joint_count = skeleton.joint_count();

        // stable, so clips keep their relative order inside a category
        animations.sort_by_key(|a| a.category);

        let frame_counts: Vec<usize> = animations.iter().map(|a| a.frames.len()).collect();
        let strides = StrideTable::from_frame_counts(&frame_counts);
        let total_frames = strides.total_frames();

        let mut poses = Vec::with_capacity(total_frames * joint_count);
        let mut trajectories = Vec::with_capacity(total_frames * trajectory_offsets.len());
        let mut joint_features = Vec::with_capacity(total_frames * compared_joints.len());

        for anim in &animations {
            if let Some(frame) = anim.frames.iter().find(|f| f.len() != joint_count) {
                return Err(MotionMatchingError::StrideMismatch {
                    table: "pose",
                    expected: joint_count,
                    actual: frame.len(),
                });
            }
            let root: Vec<RigidTransform> = anim.frames.iter().map(|f| f[0]).collect();

            for (idx, frame) in anim.frames.iter().enumerate() {
                poses.extend_from_slice(frame);

                let time = idx as f32 / frame_rate;
                let here_inv = root[idx].inverse();
                for offset in &trajectory_offsets {
                    let there = sample_track(&root, frame_rate, time + offset);
                    trajectories.push(here_inv * there);
                }

                for joint in &compared_joints {
                    joint_features.push(skeleton.root_space_transform(frame, *joint)?);
                }
            }
        }

        let events = events
            .into_iter()
            .map(|event| {
                let animation = animations
                    .iter()
                    .position(|a| a.name == event.animation)
                    .ok_or_else(|| {
                        MotionMatchingError::invalid_database(format!(
                            "event {} names unknown animation '{}'",
                            event.event_id, event.animation
                        ))
                    })?;
                Ok(EventClip {
                    event_id: event.event_id,
                    animation,
                    prepare_frame: event.prepare_frame,
                    begin_frame: event.begin_frame,
                    recovery_frame: event.recovery_frame,
                    finish_frame: event.finish_frame,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let database = PoseDatabase {
            frame_rate,
            trajectories: FrameTable::new(trajectory_offsets.len(), trajectories),
            joint_features: FrameTable::new(compared_joints.len(), joint_features),
            poses: FrameTable::new(joint_count, poses),
            animations: animations
                .into_iter()
                .map(|a| AnimationInfo {
                    frame_count: a.frames.len(),
                    name: a.name,
                    category: a.category,
                })
                .collect(),
            skeleton,
            trajectory_offsets,
            compared_joints,
            events,
            strides,
        };
        database.validate()?;

        log::info!(
            "built pose database: {} animations, {} frames at {} fps",
            database.animations.len(),
            total_frames,
            frame_rate
        );
        Ok(database)
    }
}

fn sample_track(track: &[RigidTransform], frame_rate: f32, time: f32) -> RigidTransform {
    let (f0, f1, alpha) = frame_pair(track.len(), frame_rate, time);
    if f0 == f1 {
        track[f0]
    } else {
        track[f0].interpolate(&track[f1], alpha)
    }
}
