mod common;

use approx::assert_abs_diff_eq;
use glam::Vec3;
use motion_matching::{
    generator::{FadeOut, PlayingSegment},
    AnimationGenerator, GeneratorState, PoseIdentifier, RigidTransform,
};

fn joints(output: &motion_matching::GeneratorOutput) -> Vec<RigidTransform> {
    output.joints.iter().map(|j| j.unwrap()).collect()
}

fn max_translation_step(a: &[RigidTransform], b: &[RigidTransform]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(a, b)| a.translation.distance(b.translation))
        .fold(0.0, f32::max)
}

#[test]
fn sampling_at_integer_frames_returns_stored_poses() {
    let database = common::locomotion_database();
    let walk = common::index_of(&database, "walk");
    for frame in 0..database.frame_count(walk).unwrap() {
        let time = frame as f32 / common::FRAME_RATE;
        for joint in 0..database.joints_per_frame() {
            let sampled = database.interpolated_transform(walk, time, joint).unwrap();
            let stored = database.pose_transform(PoseIdentifier::new(walk, frame), joint).unwrap();
            assert_eq!(sampled, stored, "frame {frame} joint {joint}");
        }
    }
}

#[test]
fn sampling_clamps_outside_the_clip() {
    let database = common::locomotion_database();
    let run = common::index_of(&database, "run");
    let last = database.frame_count(run).unwrap() - 1;
    let first = database.pose_transform(PoseIdentifier::new(run, 0), 2).unwrap();
    let final_pose = database.pose_transform(PoseIdentifier::new(run, last), 2).unwrap();

    assert_eq!(database.interpolated_transform(run, -1.0, 2).unwrap(), first);
    assert_eq!(database.interpolated_transform(run, 100.0, 2).unwrap(), final_pose);
}

#[test]
fn request_from_rest_plays_the_pose_directly() {
    let database = common::locomotion_database();
    let walk = common::index_of(&database, "walk");
    let begin = PoseIdentifier::new(walk, 10);
    let mut generator = AnimationGenerator::new(database.clone(), 0.3).unwrap();
    assert_eq!(generator.state(), &GeneratorState::Rest);

    generator.request_pose(begin).unwrap();
    assert_eq!(generator.state(), &GeneratorState::PlaySingle(PlayingSegment::new(begin)));

    let first = generator.update(0.0).unwrap();
    assert_eq!(joints(&first), database.pose(begin).unwrap());

    let later = generator.update(0.1).unwrap();
    let mut expected = Vec::new();
    database.sample_pose(walk, 10.0 / common::FRAME_RATE + 0.1, &mut expected).unwrap();
    for (got, want) in joints(&later).iter().zip(&expected) {
        assert!(got.abs_diff_eq(want, 1e-5));
    }
}

#[test]
fn blend_hands_over_to_the_fade_in_segment() {
    let database = common::locomotion_database();
    let walk = common::index_of(&database, "walk");
    let run = common::index_of(&database, "run");
    let mut generator = AnimationGenerator::new(database, 0.3).unwrap();
    generator.request_pose(PoseIdentifier::new(walk, 10)).unwrap();
    generator.update(0.1).unwrap();

    generator.request_pose(PoseIdentifier::new(run, 5)).unwrap();
    assert!(matches!(generator.state(), GeneratorState::Blend(_)));

    let mut previous = joints(&generator.update(0.0).unwrap());
    let step = 0.01;
    let mut elapsed = 0.0;
    while matches!(generator.state(), GeneratorState::Blend(_)) {
        let output = generator.update(step).unwrap();
        elapsed += step;
        let current = joints(&output);
        // no pops while the weight moves, nor at the handover
        assert!(max_translation_step(&previous, &current) < 0.1, "jump at {elapsed}s");
        previous = current;
        assert!(elapsed < 0.3 + 2.0 * step, "blend did not finish");
    }
    assert!(elapsed > 0.3 - 2.0 * step);

    match generator.state() {
        GeneratorState::PlaySingle(segment) => {
            assert_eq!(segment.begin, PoseIdentifier::new(run, 5));
            assert_abs_diff_eq!(segment.elapsed, elapsed, epsilon = 1e-4);
        }
        other => panic!("expected play-single, got {}", other.name()),
    }

    let output = generator.update(0.05).unwrap();
    assert!(output.root_linear_velocity.abs_diff_eq(Vec3::Z * 3.5, 1e-2));
}

#[test]
fn blend_weight_rises_linearly() {
    let database = common::locomotion_database();
    let walk = common::index_of(&database, "walk");
    let run = common::index_of(&database, "run");
    let mut generator = AnimationGenerator::new(database, 0.4).unwrap();
    generator.request_pose(PoseIdentifier::new(walk, 0)).unwrap();
    generator.update(0.1).unwrap();
    assert_eq!(generator.blend_weight(), None);

    generator.request_pose(PoseIdentifier::new(run, 0)).unwrap();
    generator.update(0.1).unwrap();
    assert_abs_diff_eq!(generator.blend_weight().unwrap(), 0.25, epsilon = 1e-5);
    generator.update(0.1).unwrap();
    assert_abs_diff_eq!(generator.blend_weight().unwrap(), 0.5, epsilon = 1e-5);
}

#[test]
fn root_velocity_mixes_during_a_blend() {
    let database = common::locomotion_database();
    let walk = common::index_of(&database, "walk");
    let run = common::index_of(&database, "run");
    let mut generator = AnimationGenerator::new(database, 0.3).unwrap();
    generator.request_pose(PoseIdentifier::new(walk, 10)).unwrap();
    let walking = generator.update(0.05).unwrap();
    assert!(walking.root_linear_velocity.abs_diff_eq(Vec3::Z * 1.4, 1e-2));

    generator.request_pose(PoseIdentifier::new(run, 10)).unwrap();
    let halfway = generator.update(0.15).unwrap();
    // weight 0.5 between 1.4 and 3.5 m/s
    assert!(halfway.root_linear_velocity.abs_diff_eq(Vec3::Z * 2.45, 2e-2));
}

#[test]
fn request_during_blend_fades_out_of_the_blended_pose() {
    let database = common::locomotion_database();
    let walk = common::index_of(&database, "walk");
    let run = common::index_of(&database, "run");
    let turn = common::index_of(&database, "turn_left");
    let mut generator = AnimationGenerator::new(database, 0.3).unwrap();

    generator.request_pose(PoseIdentifier::new(walk, 10)).unwrap();
    let before_blend = joints(&generator.update(0.1).unwrap());

    generator.request_pose(PoseIdentifier::new(run, 5)).unwrap();
    let halfway = generator.update(0.15).unwrap();
    assert_abs_diff_eq!(generator.blend_weight().unwrap(), 0.5, epsilon = 1e-5);
    let captured = joints(&halfway);
    assert!(max_translation_step(&captured, &before_blend) > 1e-3);

    generator.request_pose(PoseIdentifier::new(turn, 0)).unwrap();
    match generator.state() {
        GeneratorState::Blend(blend) => {
            assert_eq!(blend.fade_in, PlayingSegment::new(PoseIdentifier::new(turn, 0)));
            match &blend.fade_out {
                FadeOut::Snapshot(snapshot) => {
                    assert_eq!(snapshot.joints, captured);
                    assert_eq!(snapshot.linear_velocity, halfway.root_linear_velocity);
                    assert_eq!(snapshot.angular_velocity, halfway.root_angular_velocity);
                }
                FadeOut::Segment(_) => panic!("fade-out should be the frozen pose"),
            }
        }
        other => panic!("expected blend, got {}", other.name()),
    }
    assert_eq!(generator.blend_weight(), Some(0.0));

    // the frozen side does not animate, but its root keeps moving
    let next = generator.update(0.02).unwrap();
    assert!(next.root_linear_velocity.length() > 1.0);
}

#[test]
fn stop_returns_to_rest_and_holds_the_last_pose() {
    let database = common::locomotion_database();
    let walk = common::index_of(&database, "walk");
    let mut generator = AnimationGenerator::new(database, 0.3).unwrap();
    generator.play(walk).unwrap();
    let playing = joints(&generator.update(0.2).unwrap());

    generator.stop().unwrap();
    assert_eq!(generator.state(), &GeneratorState::Rest);
    assert_eq!(generator.current_pose(), None);
    let resting = generator.update(0.2).unwrap();
    assert_eq!(joints(&resting), playing);
    assert_eq!(resting.root_linear_velocity, Vec3::ZERO);
}

#[test]
fn request_after_stop_blends_out_of_the_held_pose() {
    let database = common::locomotion_database();
    let walk = common::index_of(&database, "walk");
    let run = common::index_of(&database, "run");
    let mut generator = AnimationGenerator::new(database, 0.3).unwrap();
    generator.request_pose(PoseIdentifier::new(walk, 10)).unwrap();
    let held = joints(&generator.update(0.1).unwrap());
    generator.stop().unwrap();
    generator.update(0.5).unwrap();

    // far down the run clip, the root sits metres away from the held pose
    generator.request_pose(PoseIdentifier::new(run, 40)).unwrap();
    match generator.state() {
        GeneratorState::Blend(blend) => match &blend.fade_out {
            FadeOut::Snapshot(snapshot) => {
                assert_eq!(snapshot.joints, held);
                assert_eq!(snapshot.linear_velocity, Vec3::ZERO);
                assert_eq!(snapshot.angular_velocity, Vec3::ZERO);
            }
            FadeOut::Segment(_) => panic!("fade-out should be the held pose"),
        },
        other => panic!("expected blend, got {}", other.name()),
    }

    let output = generator.update(0.001).unwrap();
    assert!(max_translation_step(&held, &joints(&output)) < 0.05);
    assert!(output.root_linear_velocity.length() < 0.1);
}

#[test]
fn root_step_across_the_handover_shrinks_with_the_step() {
    let database = common::locomotion_database();
    let walk = common::index_of(&database, "walk");
    let run = common::index_of(&database, "run");
    let blend_duration = 0.3;

    let handover_step = |epsilon: f32| {
        let mut generator = AnimationGenerator::new(database.clone(), blend_duration).unwrap();
        generator.request_pose(PoseIdentifier::new(walk, 10)).unwrap();
        generator.update(0.1).unwrap();
        generator.request_pose(PoseIdentifier::new(run, 5)).unwrap();

        let before = joints(&generator.update(blend_duration - epsilon).unwrap());
        assert!(matches!(generator.state(), GeneratorState::Blend(_)));
        let after = joints(&generator.update(2.0 * epsilon).unwrap());
        assert!(matches!(generator.state(), GeneratorState::PlaySingle(_)));
        before[0].translation.distance(after[0].translation)
    };

    let large = handover_step(0.01);
    let small = handover_step(0.002);
    // bounded speed: the step is proportional to the time spanned
    assert!(large / 0.02 < 10.0, "root moved {large} over 0.02s");
    assert!(small / 0.004 < 10.0, "root moved {small} over 0.004s");
    assert!(small < 0.5 * large);
}

#[test]
fn playback_clamps_at_the_clip_end() {
    let database = common::locomotion_database();
    let idle = common::index_of(&database, "idle");
    let last = database.frame_count(idle).unwrap() - 1;
    let mut generator = AnimationGenerator::new(database.clone(), 0.3).unwrap();
    generator.request_pose(PoseIdentifier::new(idle, last - 1)).unwrap();
    let output = generator.update(1.0).unwrap();
    assert_eq!(joints(&output), database.pose(PoseIdentifier::new(idle, last)).unwrap());
}
