//! Playback and blending of database poses.
//!
//! The generator is a three-state machine: `Rest` until the first request,
//! `PlaySingle` while one segment plays, and `Blend` while a fade-out side
//! and a fade-in side are mixed. Every transition goes through `exit` and
//! `enter`, so the state in flight is always owned by exactly one place.

use std::sync::Arc;

use glam::Vec3;

use crate::{
    clock::Clock,
    database::{PoseDatabase, PoseIdentifier},
    error::{MotionMatchingError, Result},
    transform::RigidTransform,
};

/// A pose to play from and how long it has been playing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayingSegment {
    pub begin: PoseIdentifier,
    pub elapsed: f32,
}

impl PlayingSegment {
    pub fn new(begin: PoseIdentifier) -> Self {
        Self { begin, elapsed: 0.0 }
    }

    /// Fractional frame currently playing. May run past the clip end, the
    /// database clamps when sampling.
    pub fn current_frame(&self, frame_rate: f32) -> f32 {
        frame_rate * self.elapsed + self.begin.frame as f32
    }

    pub fn clip_time(&self, frame_rate: f32) -> f32 {
        self.current_frame(frame_rate) / frame_rate
    }

    pub fn current_pose(&self, frame_rate: f32) -> PoseIdentifier {
        PoseIdentifier::new(self.begin.animation, self.current_frame(frame_rate).floor() as usize)
    }
}

/// A frozen blended pose. Its root keeps moving at the velocity it had
/// when frozen.
#[derive(Clone, Debug, PartialEq)]
pub struct PoseSnapshot {
    pub joints: Vec<RigidTransform>,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FadeOut {
    Segment(PlayingSegment),
    Snapshot(PoseSnapshot),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Blend {
    pub fade_out: FadeOut,
    pub fade_in: PlayingSegment,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GeneratorState {
    Rest,
    PlaySingle(PlayingSegment),
    Blend(Blend),
}

impl GeneratorState {
    pub fn name(&self) -> &'static str {
        match self {
            GeneratorState::Rest => "rest",
            GeneratorState::PlaySingle(_) => "play-single",
            GeneratorState::Blend(_) => "blend",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeneratorOutput {
    /// `None` for joints the consumer does not bind.
    pub joints: Vec<Option<RigidTransform>>,
    pub root_linear_velocity: Vec3,
    /// Axis * radians per second, in root space.
    pub root_angular_velocity: Vec3,
}

pub struct AnimationGenerator {
    database: Arc<PoseDatabase>,
    blend_duration: f32,
    state: Option<GeneratorState>,
    /// time spent in the current state
    clock: Clock,
    bound: Vec<bool>,
    last_pose: Vec<RigidTransform>,
    /// false until a clip has been requested, `last_pose` is the bind pose
    has_played: bool,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    scratch_out: Vec<RigidTransform>,
    scratch_in: Vec<RigidTransform>,
}

fn blend_weight(time: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        1.0
    } else {
        (time / duration).min(1.0)
    }
}

/// Moves `segment` forward by `dt`, samples its pose into `out` and returns
/// the root displacement covered.
fn advance_segment(
    database: &PoseDatabase,
    segment: &mut PlayingSegment,
    dt: f32,
    out: &mut Vec<RigidTransform>,
) -> Result<RigidTransform> {
    let frame_rate = database.frame_rate();
    let animation = segment.begin.animation;
    let before = segment.clip_time(frame_rate);
    segment.elapsed += dt;
    let after = segment.clip_time(frame_rate);

    database.sample_pose(animation, after, out)?;
    let prev_root = database.interpolated_transform(animation, before, 0)?;
    Ok(prev_root.inverse() * out[0])
}

impl AnimationGenerator {
    /// Fails if `database` breaks its layout invariants, e.g. after being
    /// deserialized without [`PoseDatabase::validate`].
    pub fn new(database: Arc<PoseDatabase>, blend_duration: f32) -> Result<Self> {
        database.validate()?;
        let last_pose = database.skeleton().bind_pose();
        Ok(Self {
            bound: vec![true; last_pose.len()],
            blend_duration,
            state: Some(GeneratorState::Rest),
            clock: Clock::new(),
            last_pose,
            has_played: false,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            scratch_out: vec![],
            scratch_in: vec![],
            database,
        })
    }

    pub fn state(&self) -> &GeneratorState {
        self.state.as_ref().unwrap_or(&GeneratorState::Rest)
    }

    pub fn blend_duration(&self) -> f32 {
        self.blend_duration
    }

    /// Current fade-in weight, `None` outside of a blend.
    pub fn blend_weight(&self) -> Option<f32> {
        match self.state() {
            GeneratorState::Blend(_) => Some(blend_weight(self.clock.current_time(), self.blend_duration)),
            _ => None,
        }
    }

    /// Marks which joints the consumer maps. Unbound joints are reported as `None`.
    pub fn bind_joints(&mut self, bound: Vec<bool>) -> Result<()> {
        if bound.len() != self.last_pose.len() {
            return Err(MotionMatchingError::FeatureLengthMismatch {
                group: "joint binding",
                expected: self.last_pose.len(),
                actual: bound.len(),
            });
        }
        self.bound = bound;
        Ok(())
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn resume(&mut self) {
        self.clock.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    /// Pose the playhead is on: the single segment, or the fade-in side.
    pub fn current_pose(&self) -> Option<PoseIdentifier> {
        let frame_rate = self.database.frame_rate();
        match self.state() {
            GeneratorState::Rest => None,
            GeneratorState::PlaySingle(segment) => Some(segment.current_pose(frame_rate)),
            GeneratorState::Blend(blend) => Some(blend.fade_in.current_pose(frame_rate)),
        }
    }

    /// Local joint transforms of the last output, unbound joints included.
    pub fn local_pose(&self) -> &[RigidTransform] {
        &self.last_pose
    }

    pub fn play(&mut self, animation: usize) -> Result<()> {
        self.request_pose(PoseIdentifier::new(animation, 0))
    }

    /// Switches playback to `pose`. From a fresh `Rest` this plays it
    /// directly, from `PlaySingle` it blends over from the running segment.
    /// During a blend, or at `Rest` after a stop, it freezes the pose being
    /// output as the new fade-out side.
    pub fn request_pose(&mut self, pose: PoseIdentifier) -> Result<()> {
        self.database.frame_count(pose.animation)?;
        let fade_in = PlayingSegment::new(pose);
        let next = match self.exit()? {
            GeneratorState::Rest if !self.has_played => GeneratorState::PlaySingle(fade_in),
            // held after a stop, the root is not moving
            GeneratorState::Rest => GeneratorState::Blend(Blend {
                fade_out: FadeOut::Snapshot(PoseSnapshot {
                    joints: self.last_pose.clone(),
                    linear_velocity: Vec3::ZERO,
                    angular_velocity: Vec3::ZERO,
                }),
                fade_in,
            }),
            GeneratorState::PlaySingle(segment) => GeneratorState::Blend(Blend {
                fade_out: FadeOut::Segment(segment),
                fade_in,
            }),
            // last_pose is the blended pose at the current weight
            GeneratorState::Blend(_) => GeneratorState::Blend(Blend {
                fade_out: FadeOut::Snapshot(PoseSnapshot {
                    joints: self.last_pose.clone(),
                    linear_velocity: self.linear_velocity,
                    angular_velocity: self.angular_velocity,
                }),
                fade_in,
            }),
        };
        self.has_played = true;
        self.enter(next)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.exit()?;
        self.enter(GeneratorState::Rest)
    }

    pub fn update(&mut self, dt: f32) -> Result<GeneratorOutput> {
        let dt = self.clock.tick(dt);
        let database = &*self.database;
        let mut finished = None;

        let delta = match self.state.as_mut() {
            None => return Err(MotionMatchingError::InvalidTransition("update between exit and enter")),
            Some(GeneratorState::Rest) => RigidTransform::IDENTITY,
            Some(GeneratorState::PlaySingle(segment)) => {
                advance_segment(database, segment, dt, &mut self.last_pose)?
            }
            Some(GeneratorState::Blend(blend)) => {
                let weight = blend_weight(self.clock.current_time(), self.blend_duration);
                let out_delta = match &mut blend.fade_out {
                    FadeOut::Segment(segment) => {
                        advance_segment(database, segment, dt, &mut self.scratch_out)?
                    }
                    FadeOut::Snapshot(snapshot) => {
                        self.scratch_out.clear();
                        self.scratch_out.extend_from_slice(&snapshot.joints);
                        RigidTransform::from_velocities(snapshot.linear_velocity, snapshot.angular_velocity, dt)
                    }
                };
                let in_delta = advance_segment(database, &mut blend.fade_in, dt, &mut self.scratch_in)?;

                self.last_pose.clear();
                self.last_pose.extend(
                    self.scratch_out
                        .iter()
                        .zip(&self.scratch_in)
                        .map(|(a, b)| a.interpolate(b, weight)),
                );
                if weight >= 1.0 {
                    finished = Some(blend.fade_in);
                }
                out_delta.interpolate(&in_delta, weight)
            }
        };

        if let Some(segment) = finished {
            self.exit()?;
            self.enter(GeneratorState::PlaySingle(segment))?;
        }

        let (linear, angular) = delta.velocities(dt);
        self.linear_velocity = linear;
        self.angular_velocity = angular;

        Ok(GeneratorOutput {
            joints: self
                .last_pose
                .iter()
                .zip(&self.bound)
                .map(|(joint, bound)| bound.then_some(*joint))
                .collect(),
            root_linear_velocity: linear,
            root_angular_velocity: angular,
        })
    }

    fn exit(&mut self) -> Result<GeneratorState> {
        self.state
            .take()
            .ok_or(MotionMatchingError::InvalidTransition("exit without an active state"))
    }

    fn enter(&mut self, next: GeneratorState) -> Result<()> {
        if self.state.is_some() {
            return Err(MotionMatchingError::InvalidTransition("enter while another state is active"));
        }
        log::debug!("generator enters {}", next.name());
        self.clock.reset();
        self.state = Some(next);
        Ok(())
    }
}
