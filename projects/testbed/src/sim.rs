use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_queue::SegQueue;
use glam::{Quat, Vec3};
use motion_matching::{MotionMatcher, RigidTransform, TickInput, TrajectoryPoint};

use crate::handoff::{CharacterFrame, FrameHandoff};

#[derive(Debug)]
pub enum InputEvent {
    /// Desired speed in m/s and turn rate in rad/s.
    Steer { speed: f32, turn_rate: f32 },
    Idle,
    Event(u32),
    Pause,
    Resume,
    Exit,
}

pub const TICK: Duration = Duration::from_micros(33_333);
const SPIN: Duration = Duration::from_micros(200);

/// Where a character steering at `speed` and `turn_rate` will be after
/// `offset` seconds, seen from its current root.
fn predict(speed: f32, turn_rate: f32, offset: f32) -> RigidTransform {
    const STEPS: usize = 8;
    let dt = offset / STEPS as f32;
    let mut heading = 0.0f32;
    let mut position = Vec3::ZERO;
    for _ in 0..STEPS {
        position += Quat::from_rotation_y(heading) * Vec3::Z * speed * dt;
        heading += turn_rate * dt;
    }
    RigidTransform::new(position, Quat::from_rotation_y(heading))
}

pub fn spawn_sim(
    mut matcher: MotionMatcher,
    inputs: Arc<SegQueue<InputEvent>>,
    handoff: Arc<FrameHandoff>,
) -> thread::JoinHandle<anyhow::Result<()>> {
    thread::spawn(move || {
        let future_offsets = matcher.database().future_offsets().to_vec();
        let mut speed = 0.0f32;
        let mut turn_rate = 0.0f32;
        let mut is_idle = true;
        let mut event = None;
        let mut root = RigidTransform::IDENTITY;

        let mut next = Instant::now() + TICK;
        let mut prev_tick = Instant::now();
        let mut tick = 0u32;
        loop {
            let now = Instant::now();
            let dt = (now - prev_tick).as_secs_f32();
            prev_tick = now;

            while let Some(input) = inputs.pop() {
                match input {
                    InputEvent::Exit => return Ok(()),
                    InputEvent::Steer { speed: s, turn_rate: t } => {
                        speed = s;
                        turn_rate = t;
                        is_idle = false;
                    }
                    InputEvent::Idle => {
                        speed = 0.0;
                        turn_rate = 0.0;
                        is_idle = true;
                    }
                    InputEvent::Event(id) => event = Some(id),
                    InputEvent::Pause => matcher.pause(),
                    InputEvent::Resume => matcher.resume(),
                }
            }

            let future: Vec<TrajectoryPoint> = future_offsets
                .iter()
                .map(|offset| TrajectoryPoint {
                    time_offset: *offset,
                    transform: predict(speed, turn_rate, *offset),
                })
                .collect();

            let out = matcher.tick(&TickInput {
                delta_time: dt,
                root_world_transform: root,
                future_trajectory: &future,
                is_idle,
                event,
            })?;

            if let Some(selection) = out.selection {
                log::debug!("tick {tick}: selected {:?} cost {:.3}", selection.pose, selection.cost);
                // event requests are one-shot, the search that served it consumes it
                event = None;
            }

            // integrate the animation's root motion
            let step = RigidTransform::from_velocities(out.pose.root_linear_velocity, out.pose.root_angular_velocity, dt);
            root = root * step;

            handoff.publish(CharacterFrame {
                tick,
                root,
                playing: matcher.generator().current_pose(),
                state: matcher.generator().state().name(),
                pose: out.pose,
            });

            next += TICK;

            // sleep most of the remaining time, then spin the last bit
            if let Some(remain) = next.checked_duration_since(Instant::now()) {
                if remain > SPIN {
                    thread::sleep(remain - SPIN);
                }
                while Instant::now() < next {
                    std::hint::spin_loop();
                }
            } else {
                // fell behind, resync the schedule
                next = Instant::now() + TICK;
            }

            tick = tick.wrapping_add(1);
        }
    })
}
