use std::{ops::Range, sync::Arc, thread::JoinHandle};

use crossbeam::channel::{Receiver, Sender, TryRecvError};

use crate::{
    database::{PoseDatabase, PoseIdentifier},
    error::{MotionMatchingError, Result},
    feature::QueryFeatures,
    search::{check_search, reduce, search_batch, CostWeights, SearchResult},
};

pub struct SearchTask {
    pub database: Arc<PoseDatabase>,
    pub query: Arc<QueryFeatures>,
    pub candidates: Arc<[PoseIdentifier]>,
    /// slice of `candidates` this task owns
    pub range: Range<usize>,
    pub batch_index: usize,
    pub weights: CostWeights,
    pub reply: Sender<BatchResult>,
}

pub enum Task {
    Search(SearchTask),
}

pub struct BatchResult {
    pub batch_index: usize,
    pub result: Result<SearchResult>,
}

fn execute_search_task(task: SearchTask) {
    let batch = &task.candidates[task.range.clone()];
    let result = search_batch(&task.database, &task.query, batch, &task.weights);
    if let Ok(best) = &result {
        log::trace!("batch {} best {:?} cost {}", task.batch_index, best.pose, best.cost);
    }
    // the search was dropped before finishing, nobody is listening anymore
    let _ = task.reply.send(BatchResult {
        batch_index: task.batch_index,
        result,
    });
}

fn worker_loop(rx: Receiver<Task>) {
    while let Ok(task) = rx.recv() {
        match task {
            Task::Search(task) => execute_search_task(task),
        }
    }
}

/// Fixed set of search threads fed through one task channel.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    task_tx: Option<Sender<Task>>,
}

impl WorkerPool {
    pub fn init(worker_count: usize) -> Self {
        let (task_tx, task_rx) = crossbeam::channel::unbounded::<Task>();

        let workers = (0..worker_count.max(1))
            .map(|_| {
                let rx = task_rx.clone();
                std::thread::spawn(move || {
                    worker_loop(rx);
                })
            })
            .collect();

        Self {
            workers,
            task_tx: Some(task_tx),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Splits `candidates` into batches of `batch_size` and queues them.
    /// Returns immediately; poll the returned handle for the result.
    pub fn schedule(
        &self,
        database: Arc<PoseDatabase>,
        query: Arc<QueryFeatures>,
        candidates: Arc<[PoseIdentifier]>,
        weights: CostWeights,
        batch_size: usize,
    ) -> Result<PendingSearch> {
        check_search(&database, &query, &candidates)?;
        if batch_size == 0 {
            return Err(MotionMatchingError::invalid_config("batch size must be positive"));
        }
        let task_tx = self
            .task_tx
            .as_ref()
            .ok_or(MotionMatchingError::WorkerPoolDisconnected { pending: 0 })?;

        let batch_count = candidates.len().div_ceil(batch_size);
        let (reply, reply_rx) = crossbeam::channel::bounded(batch_count);
        for batch_index in 0..batch_count {
            let start = batch_index * batch_size;
            let end = (start + batch_size).min(candidates.len());
            let task = SearchTask {
                database: database.clone(),
                query: query.clone(),
                candidates: candidates.clone(),
                range: start..end,
                batch_index,
                weights,
                reply: reply.clone(),
            };
            if task_tx.send(Task::Search(task)).is_err() {
                return Err(MotionMatchingError::WorkerPoolDisconnected {
                    pending: batch_count - batch_index,
                });
            }
        }
        log::debug!("scheduled search over {} candidates in {} batches", candidates.len(), batch_count);

        Ok(PendingSearch {
            slots: vec![None; batch_count],
            remaining: batch_count,
            reply_rx,
        })
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // closing the channel ends every worker loop
        self.task_tx.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("search worker panicked");
            }
        }
    }
}

/// One in-flight search. Each batch writes only its own slot.
pub struct PendingSearch {
    slots: Vec<Option<SearchResult>>,
    remaining: usize,
    reply_rx: Receiver<BatchResult>,
}

impl PendingSearch {
    pub fn batch_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Collects finished batches without blocking. `Ok(None)` means some
    /// batches are still running.
    pub fn poll(&mut self) -> Result<Option<SearchResult>> {
        while self.remaining > 0 {
            match self.reply_rx.try_recv() {
                Ok(batch) => self.store(batch)?,
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => {
                    return Err(MotionMatchingError::WorkerPoolDisconnected {
                        pending: self.remaining,
                    })
                }
            }
        }
        Ok(self.reduce())
    }

    /// Blocks until every batch is in.
    pub fn wait(mut self) -> Result<SearchResult> {
        while self.remaining > 0 {
            let batch = self
                .reply_rx
                .recv()
                .map_err(|_| MotionMatchingError::WorkerPoolDisconnected {
                    pending: self.remaining,
                })?;
            self.store(batch)?;
        }
        self.reduce().ok_or(MotionMatchingError::EmptySearchRange)
    }

    fn store(&mut self, batch: BatchResult) -> Result<()> {
        let result = batch.result?;
        let slot = &mut self.slots[batch.batch_index];
        if slot.is_none() {
            self.remaining -= 1;
        }
        *slot = Some(result);
        Ok(())
    }

    fn reduce(&self) -> Option<SearchResult> {
        reduce(self.slots.iter().flatten().copied())
    }
}
