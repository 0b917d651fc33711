//! Motion matching: picks the database frame that best continues the
//! requested motion, then blends playback into it and reports root motion.

pub mod clock;
pub mod config;
pub mod controller;
pub mod database;
pub mod error;
pub mod feature;
pub mod generator;
pub mod job_system;
pub mod search;
pub mod skeleton;
pub mod trajectory;
pub mod transform;

pub use clock::Clock;
pub use config::MotionMatchingConfig;
pub use controller::{CandidateSet, MotionMatcher, TickInput, TickOutput};
pub use database::{AnimationSource, Category, EventSource, PoseDatabase, PoseDatabaseBuilder, PoseIdentifier};
pub use error::{MotionMatchingError, Result};
pub use feature::{FeatureVector, QueryFeatures, TrajectoryPoint};
pub use generator::{AnimationGenerator, GeneratorOutput, GeneratorState};
pub use search::{batched_search, linear_search, CostWeights, SearchResult};
pub use skeleton::{Joint, Skeleton};
pub use trajectory::{RecorderDirection, TrajectoryRecorder};
pub use transform::RigidTransform;
