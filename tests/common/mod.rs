#![allow(dead_code)]

use std::sync::Arc;

use glam::{Quat, Vec3};
use motion_matching::{
    AnimationSource, Category, EventSource, Joint, PoseDatabase, PoseDatabaseBuilder, RigidTransform, Skeleton,
};

pub const FRAME_RATE: f32 = 30.0;
pub const JUMP_EVENT: u32 = 7;

pub fn skeleton() -> Skeleton {
    Skeleton::new(vec![
        Joint { name: "root".into(), parent: None, bind: RigidTransform::IDENTITY },
        Joint { name: "hips".into(), parent: Some(0), bind: RigidTransform::from_translation(Vec3::Y) },
        Joint { name: "foot".into(), parent: Some(1), bind: RigidTransform::from_translation(Vec3::new(0.1, -0.9, 0.0)) },
    ])
    .unwrap()
}

/// Root moves forward at `speed` m/s while turning at `yaw_rate` rad/s.
/// The foot swings with the gait and drifts a little every frame, so no two
/// frames share joint features.
pub fn clip(name: &str, category: Category, frame_count: usize, speed: f32, yaw_rate: f32) -> AnimationSource {
    let dt = 1.0 / FRAME_RATE;
    let gait = 2.0 + speed * 2.0;
    let mut position = Vec3::ZERO;
    let mut frames = Vec::with_capacity(frame_count);
    for idx in 0..frame_count {
        let t = idx as f32 * dt;
        let heading = Quat::from_rotation_y(yaw_rate * t);
        if idx > 0 {
            position += heading * Vec3::Z * speed * dt;
        }
        let root = RigidTransform::new(position, heading);
        let hips = RigidTransform::from_translation(Vec3::new(0.0, 1.0 + 0.03 * (gait * t).sin(), 0.0));
        let foot = RigidTransform::new(
            Vec3::new(0.1, -0.9, 0.25 * (gait * t).sin() + 0.01 * idx as f32),
            Quat::from_rotation_x(0.2 * (gait * t).cos()),
        );
        frames.push(vec![root, hips, foot]);
    }
    AnimationSource { name: name.into(), category, frames }
}

pub fn builder() -> PoseDatabaseBuilder {
    PoseDatabaseBuilder::new(skeleton(), FRAME_RATE)
        .with_trajectory_offsets(vec![-0.2, -0.1, 0.1, 0.2, 0.4])
        .with_compared_joints(vec![1, 2])
}

/// Walk, run, turn, idle and one jump event clip.
pub fn locomotion_database() -> Arc<PoseDatabase> {
    let mut builder = builder();
    builder
        .add_animation(clip("idle", Category::Idle, 60, 0.0, 0.0))
        .add_animation(clip("walk", Category::Motion, 60, 1.4, 0.0))
        .add_animation(clip("run", Category::Motion, 60, 3.5, 0.0))
        .add_animation(clip("turn_left", Category::Motion, 60, 1.2, 1.0))
        .add_animation(clip("jump", Category::Event, 45, 2.0, 0.0))
        .add_event(EventSource {
            event_id: JUMP_EVENT,
            animation: "jump".into(),
            prepare_frame: 5,
            begin_frame: 15,
            recovery_frame: 30,
            finish_frame: 40,
        });
    Arc::new(builder.build().unwrap())
}

/// Two short motion clips at 30 fps.
pub fn two_clip_database(frame_count: usize) -> Arc<PoseDatabase> {
    let mut builder = builder();
    builder
        .add_animation(clip("walk", Category::Motion, frame_count, 1.4, 0.0))
        .add_animation(clip("run", Category::Motion, frame_count, 3.5, 0.3));
    Arc::new(builder.build().unwrap())
}

pub fn index_of(database: &PoseDatabase, name: &str) -> usize {
    database.animations().iter().position(|a| a.name == name).unwrap()
}
