use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use arc_swap::{ArcSwap, Guard};
use motion_matching::{GeneratorOutput, PoseIdentifier, RigidTransform};

/// What the sim thread publishes after every tick.
#[derive(Clone, Debug, Default)]
pub struct CharacterFrame {
    pub tick: u32,
    pub root: RigidTransform,
    pub pose: GeneratorOutput,
    pub playing: Option<PoseIdentifier>,
    pub state: &'static str,
}

/// The latest frame and when it was stored.
#[derive(Debug)]
pub struct Stamped {
    pub frame: CharacterFrame,
    pub at: Instant,
}

impl Stamped {
    /// Root carried forward along the frame's root motion, for readers that
    /// sample between sim ticks. Never extrapolates more than `limit`.
    pub fn root_at(&self, now: Instant, limit: Duration) -> RigidTransform {
        let ahead = now.saturating_duration_since(self.at).min(limit).as_secs_f32();
        let pose = &self.frame.pose;
        self.frame.root * RigidTransform::from_velocities(pose.root_linear_velocity, pose.root_angular_velocity, ahead)
    }
}

/// Single writer, many readers. Readers always see a whole frame.
pub struct FrameHandoff {
    latest: ArcSwap<Stamped>,
}

impl Default for FrameHandoff {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHandoff {
    pub fn new() -> Self {
        Self {
            latest: ArcSwap::from_pointee(Stamped {
                frame: CharacterFrame::default(),
                at: Instant::now(),
            }),
        }
    }

    pub fn publish(&self, frame: CharacterFrame) {
        self.latest.store(Arc::new(Stamped { frame, at: Instant::now() }));
    }

    pub fn latest(&self) -> Guard<Arc<Stamped>> {
        self.latest.load()
    }
}
