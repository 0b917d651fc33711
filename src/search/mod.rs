//! Nearest-neighbour pose search.
//!
//! Candidates are split into contiguous batches. Each batch finds its own
//! minimum and the batch minima are reduced in batch order with a strict
//! `<`, so the first candidate reaching the minimum wins no matter how the
//! batches were scheduled. [`linear_search`] is the sequential reference,
//! [`batched_search`] the blocking fork-join variant, and
//! [`crate::job_system::WorkerPool`] the non-blocking one used per tick.

use crate::{
    database::{PoseDatabase, PoseIdentifier},
    error::{MotionMatchingError, Result},
    feature::QueryFeatures,
};

pub mod cost;

pub use cost::{feature_cost, CostWeights};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchResult {
    pub pose: PoseIdentifier,
    pub cost: f32,
}

/// Fatal setup errors, checked before any work is scheduled.
pub fn check_search(database: &PoseDatabase, query: &QueryFeatures, candidates: &[PoseIdentifier]) -> Result<()> {
    if candidates.is_empty() {
        return Err(MotionMatchingError::EmptySearchRange);
    }
    query.check(database)
}

/// Minimum over one batch, first candidate wins ties.
pub fn search_batch(
    database: &PoseDatabase,
    query: &QueryFeatures,
    batch: &[PoseIdentifier],
    weights: &CostWeights,
) -> Result<SearchResult> {
    let past_count = database.past_count();
    let mut best: Option<SearchResult> = None;
    for id in batch {
        let candidate = database.feature_vector(*id)?;
        let cost = feature_cost(query, &candidate, past_count, weights);
        if best.map_or(true, |b| cost < b.cost) {
            best = Some(SearchResult {
                pose: candidate.pose,
                cost,
            });
        }
    }
    best.ok_or(MotionMatchingError::EmptySearchRange)
}

/// Reduces per-batch minima in batch order.
pub fn reduce<I: IntoIterator<Item = SearchResult>>(batches: I) -> Option<SearchResult> {
    batches.into_iter().fold(None, |best, result| match best {
        Some(b) if b.cost <= result.cost => Some(b),
        _ => Some(result),
    })
}

pub fn linear_search(
    database: &PoseDatabase,
    query: &QueryFeatures,
    candidates: &[PoseIdentifier],
    weights: &CostWeights,
) -> Result<SearchResult> {
    check_search(database, query, candidates)?;
    search_batch(database, query, candidates, weights)
}

/// Blocking fork-join search, one scoped thread per batch.
pub fn batched_search(
    database: &PoseDatabase,
    query: &QueryFeatures,
    candidates: &[PoseIdentifier],
    weights: &CostWeights,
    batch_size: usize,
) -> Result<SearchResult> {
    check_search(database, query, candidates)?;
    if batch_size == 0 {
        return Err(MotionMatchingError::invalid_config("batch size must be positive"));
    }

    let batch_count = candidates.len().div_ceil(batch_size);
    let mut slots: Vec<Option<Result<SearchResult>>> = (0..batch_count).map(|_| None).collect();
    crossbeam::scope(|s| {
        for (slot, batch) in slots.iter_mut().zip(candidates.chunks(batch_size)) {
            s.spawn(move |_| {
                *slot = Some(search_batch(database, query, batch, weights));
            });
        }
    })
    .map_err(|_| MotionMatchingError::WorkerPanicked)?;

    let minima = slots
        .into_iter()
        .map(|slot| slot.unwrap_or(Err(MotionMatchingError::WorkerPanicked)))
        .collect::<Result<Vec<_>>>()?;
    reduce(minima).ok_or(MotionMatchingError::EmptySearchRange)
}
