use glam::{Quat, Vec3};
use motion_matching::{
    AnimationSource, Category, EventSource, Joint, PoseDatabase, PoseDatabaseBuilder, RigidTransform, Skeleton,
};

pub const JUMP_EVENT: u32 = 1;

const FRAME_RATE: f32 = 30.0;

fn skeleton() -> motion_matching::Result<Skeleton> {
    let joint = |name: &str, parent: Option<usize>, offset: Vec3| Joint {
        name: name.into(),
        parent,
        bind: RigidTransform::from_translation(offset),
    };
    Skeleton::new(vec![
        joint("root", None, Vec3::ZERO),
        joint("hips", Some(0), Vec3::Y),
        joint("left_foot", Some(1), Vec3::new(0.12, -0.9, 0.0)),
        joint("right_foot", Some(1), Vec3::new(-0.12, -0.9, 0.0)),
    ])
}

/// A procedural gait: the root follows an arc, the feet swing in opposite
/// phase and the hips bob twice per stride.
fn gait(name: &str, category: Category, seconds: f32, speed: f32, turn_rate: f32) -> AnimationSource {
    let frame_count = (seconds * FRAME_RATE) as usize + 1;
    let stride = 2.0 + 2.0 * speed;
    let mut position = Vec3::ZERO;
    let frames = (0..frame_count)
        .map(|idx| {
            let t = idx as f32 / FRAME_RATE;
            let heading = Quat::from_rotation_y(turn_rate * t);
            if idx > 0 {
                position += heading * Vec3::Z * speed / FRAME_RATE;
            }
            let swing = 0.3 * (speed / 3.5).min(1.0) * (stride * t).sin();
            vec![
                RigidTransform::new(position, heading),
                RigidTransform::from_translation(Vec3::new(0.0, 1.0 + 0.04 * (2.0 * stride * t).sin(), 0.0)),
                RigidTransform::from_translation(Vec3::new(0.12, -0.9, swing)),
                RigidTransform::from_translation(Vec3::new(-0.12, -0.9, -swing)),
            ]
        })
        .collect();
    AnimationSource { name: name.into(), category, frames }
}

pub fn database() -> motion_matching::Result<PoseDatabase> {
    let mut builder = PoseDatabaseBuilder::new(skeleton()?, FRAME_RATE)
        .with_trajectory_offsets(vec![-0.3, -0.15, 0.2, 0.4, 0.7])
        .with_compared_joints(vec![2, 3]);
    builder
        .add_animation(gait("idle", Category::Idle, 4.0, 0.0, 0.0))
        .add_animation(gait("walk", Category::Motion, 4.0, 1.4, 0.0))
        .add_animation(gait("walk_left", Category::Motion, 4.0, 1.3, 0.8))
        .add_animation(gait("walk_right", Category::Motion, 4.0, 1.3, -0.8))
        .add_animation(gait("run", Category::Motion, 4.0, 3.5, 0.0))
        .add_animation(gait("jump", Category::Event, 2.0, 2.5, 0.0))
        .add_event(EventSource {
            event_id: JUMP_EVENT,
            animation: "jump".into(),
            prepare_frame: 6,
            begin_frame: 18,
            recovery_frame: 36,
            finish_frame: 54,
        });
    builder.build()
}
