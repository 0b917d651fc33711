//! Error types for the motion matching engine.
//!
//! Only fatal conditions live here. Out-of-range times and frames are clamped
//! by the database, and a search that has not finished yet is reported as
//! `None` by the poll API rather than as an error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotionMatchingError {
    #[error("unknown animation {id}: database holds {count} animations")]
    UnknownAnimation { id: usize, count: usize },

    #[error("unknown joint {joint}: expected fewer than {count}")]
    UnknownJoint { joint: usize, count: usize },

    #[error("unknown event {0}")]
    UnknownEvent(u32),

    /// A flattened table does not hold `frames * stride` entries.
    #[error("{table} table holds {actual} entries, expected {expected}")]
    StrideMismatch {
        table: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A query feature group has a different length than the database stride.
    #[error("query {group} group has {actual} entries, database expects {expected}")]
    FeatureLengthMismatch {
        group: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("search over an empty candidate range")]
    EmptySearchRange,

    #[error("invalid skeleton: {0}")]
    InvalidSkeleton(String),

    #[error("invalid database: {0}")]
    InvalidDatabase(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid generator transition: {0}")]
    InvalidTransition(&'static str),

    #[error("search worker pool disconnected with {pending} batches outstanding")]
    WorkerPoolDisconnected { pending: usize },

    #[error("search worker panicked")]
    WorkerPanicked,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MotionMatchingError>;

impl MotionMatchingError {
    pub fn invalid_database(msg: impl Into<String>) -> Self {
        Self::InvalidDatabase(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn invalid_skeleton(msg: impl Into<String>) -> Self {
        Self::InvalidSkeleton(msg.into())
    }
}
