use std::{
    env,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use crossbeam_queue::SegQueue;
use motion_matching::{MotionMatcher, MotionMatchingConfig, PoseDatabase, RigidTransform, TrajectoryRecorder};

mod demo;
mod handoff;
mod sim;

use handoff::FrameHandoff;
use sim::InputEvent;

const REPORT_INTERVAL: Duration = Duration::from_millis(500);

/// Scripted steering: seconds since start, then the input to send.
fn script() -> Vec<(f32, InputEvent)> {
    vec![
        (0.5, InputEvent::Steer { speed: 1.4, turn_rate: 0.0 }),
        (3.0, InputEvent::Steer { speed: 3.5, turn_rate: 0.0 }),
        (5.0, InputEvent::Steer { speed: 1.3, turn_rate: 0.8 }),
        (7.0, InputEvent::Event(demo::JUMP_EVENT)),
        (8.0, InputEvent::Pause),
        (9.0, InputEvent::Resume),
        (9.5, InputEvent::Steer { speed: 1.3, turn_rate: -0.8 }),
        (11.5, InputEvent::Idle),
        (13.0, InputEvent::Exit),
    ]
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // testbed [database.json] [config.json]
    let args: Vec<String> = env::args().collect();
    let database = match args.get(1) {
        Some(path) => PoseDatabase::from_path(path).with_context(|| format!("loading pose database {path}"))?,
        None => demo::database().context("building demo database")?,
    };
    let config = match args.get(2) {
        Some(path) => MotionMatchingConfig::from_path(path).with_context(|| format!("loading config {path}"))?,
        None => MotionMatchingConfig::default(),
    };

    let matcher = MotionMatcher::new(Arc::new(database), config, RigidTransform::IDENTITY)?;
    let inputs = Arc::new(SegQueue::new());
    let handoff = Arc::new(FrameHandoff::new());
    let sim = sim::spawn_sim(matcher, inputs.clone(), handoff.clone());

    // distance covered over the last half and full second, sampled at report rate
    let mut travel = TrajectoryRecorder::post(&[0.5, 1.0], RigidTransform::IDENTITY)?;
    let mut script = script().into_iter().peekable();
    let start = Instant::now();
    let mut last_report = Instant::now();
    while !sim.is_finished() {
        let elapsed = start.elapsed().as_secs_f32();
        while let Some((_, input)) = script.next_if(|(at, _)| *at <= elapsed) {
            log::info!("{elapsed:.2}s: {input:?}");
            inputs.push(input);
        }

        if last_report.elapsed() >= REPORT_INTERVAL {
            let dt = last_report.elapsed().as_secs_f32();
            last_report = Instant::now();
            let latest = handoff.latest();
            let frame = &latest.frame;
            travel.record(frame.root, dt);
            let covered: Vec<f32> = travel.points().map(|p| p.transform.translation.length()).collect();
            log::info!(
                "tick {} {} {:?} at {:.2?}, speed {:.2} m/s, travelled {:.2?} m",
                frame.tick,
                frame.state,
                frame.playing,
                latest.root_at(Instant::now(), sim::TICK).translation,
                frame.pose.root_linear_velocity.length(),
                covered
            );
        }
        thread::sleep(Duration::from_millis(5));
    }

    sim.join().map_err(|_| anyhow!("sim thread panicked"))??;
    Ok(())
}
