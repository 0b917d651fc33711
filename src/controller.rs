//! The per-tick driver tying recorder, search and generator together.

use std::{collections::HashMap, sync::Arc};

use crate::{
    clock::Clock,
    config::MotionMatchingConfig,
    database::{Category, PoseDatabase, PoseIdentifier},
    error::Result,
    feature::{QueryFeatures, TrajectoryPoint},
    generator::{AnimationGenerator, GeneratorOutput},
    job_system::{PendingSearch, WorkerPool},
    search::SearchResult,
    trajectory::TrajectoryRecorder,
    transform::RigidTransform,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CandidateSet {
    Category(Category),
    Event(u32),
}

pub struct TickInput<'a> {
    pub delta_time: f32,
    pub root_world_transform: RigidTransform,
    /// One point per future offset of the database, local to the root.
    pub future_trajectory: &'a [TrajectoryPoint],
    pub is_idle: bool,
    pub event: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickOutput {
    pub pose: GeneratorOutput,
    /// Search result consumed during this tick.
    pub selection: Option<SearchResult>,
}

pub struct MotionMatcher {
    database: Arc<PoseDatabase>,
    config: MotionMatchingConfig,
    past: TrajectoryRecorder,
    generator: AnimationGenerator,
    pool: WorkerPool,
    pending: Option<PendingSearch>,
    /// marked whenever a search is scheduled
    search_clock: Clock,
    searched: bool,
    candidates: HashMap<CandidateSet, Arc<[PoseIdentifier]>>,
    last_selection: Option<SearchResult>,
}

impl MotionMatcher {
    pub fn new(database: Arc<PoseDatabase>, config: MotionMatchingConfig, initial: RigidTransform) -> Result<Self> {
        config.validate()?;
        // a database deserialized without `from_json_reader` has not been checked
        database.validate()?;
        let past = TrajectoryRecorder::past(database.past_offsets(), initial)?;
        let generator = AnimationGenerator::new(database.clone(), config.blend_duration)?;
        let pool = WorkerPool::init(config.worker_count);
        log::info!(
            "motion matcher ready: {} search workers, batches of {}",
            pool.worker_count(),
            config.batch_size
        );
        Ok(Self {
            database,
            config,
            past,
            generator,
            pool,
            pending: None,
            search_clock: Clock::new(),
            searched: false,
            candidates: HashMap::new(),
            last_selection: None,
        })
    }

    pub fn database(&self) -> &Arc<PoseDatabase> {
        &self.database
    }

    pub fn config(&self) -> &MotionMatchingConfig {
        &self.config
    }

    pub fn generator(&self) -> &AnimationGenerator {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut AnimationGenerator {
        &mut self.generator
    }

    pub fn past_trajectory(&self) -> &[RigidTransform] {
        self.past.trajectory()
    }

    pub fn last_selection(&self) -> Option<SearchResult> {
        self.last_selection
    }

    pub fn is_searching(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pause(&mut self) {
        self.generator.pause();
        self.search_clock.pause();
    }

    pub fn resume(&mut self) {
        self.generator.resume();
        self.search_clock.resume();
    }

    /// Candidate ids of `set`, built on first use.
    pub fn candidates(&mut self, set: CandidateSet) -> Result<Arc<[PoseIdentifier]>> {
        if let Some(ids) = self.candidates.get(&set) {
            return Ok(ids.clone());
        }
        let horizon = self.config.search_horizon;
        let ids: Arc<[PoseIdentifier]> = match set {
            CandidateSet::Category(category) => self.database.candidates(category, horizon).collect(),
            CandidateSet::Event(event_id) => self.database.event_candidates(event_id, horizon)?.collect(),
        };
        log::debug!("{:?}: {} candidates", set, ids.len());
        self.candidates.insert(set, ids.clone());
        Ok(ids)
    }

    /// Past slots + `future` + compared joints of the current output pose.
    pub fn build_query(&self, future: &[TrajectoryPoint]) -> Result<QueryFeatures> {
        let skeleton = self.database.skeleton();
        let locals = self.generator.local_pose();
        let joints = self
            .database
            .compared_joints()
            .iter()
            .map(|joint| skeleton.root_space_transform(locals, *joint))
            .collect::<Result<Vec<_>>>()?;
        let mut query = QueryFeatures::assemble(
            &self.database,
            self.past.trajectory(),
            future,
            joints,
            self.config.future_time_tolerance,
        )?;
        query.current = self.generator.current_pose();
        Ok(query)
    }

    pub fn tick(&mut self, input: &TickInput<'_>) -> Result<TickOutput> {
        let dt = input.delta_time.max(0.0);
        self.past.record(input.root_world_transform, dt);
        self.search_clock.tick(dt);

        let mut selection = None;
        if let Some(pending) = self.pending.as_mut() {
            if let Some(result) = pending.poll()? {
                self.pending = None;
                self.apply_selection(result)?;
                selection = Some(result);
            }
        }

        let due = !self.searched || self.search_clock.since_mark() >= self.config.update_interval;
        if self.pending.is_none() && due {
            let set = match (input.event, input.is_idle) {
                (Some(event_id), _) => CandidateSet::Event(event_id),
                (None, true) => CandidateSet::Category(Category::Idle),
                (None, false) => CandidateSet::Category(Category::Motion),
            };
            let query = self.build_query(input.future_trajectory)?;
            let candidates = self.candidates(set)?;
            self.pending = Some(self.pool.schedule(
                self.database.clone(),
                Arc::new(query),
                candidates,
                self.config.weights,
                self.config.batch_size,
            )?);
            self.search_clock.mark();
            self.searched = true;
        }

        let pose = self.generator.update(dt)?;
        Ok(TickOutput { pose, selection })
    }

    /// Blocks on the in-flight search, if any, and applies its result.
    pub fn finish_search(&mut self) -> Result<Option<SearchResult>> {
        let Some(pending) = self.pending.take() else {
            return Ok(None);
        };
        let result = pending.wait()?;
        self.apply_selection(result)?;
        Ok(Some(result))
    }

    fn apply_selection(&mut self, result: SearchResult) -> Result<()> {
        self.last_selection = Some(result);
        if let Some(current) = self.generator.current_pose() {
            let same_clip = current.animation == result.pose.animation;
            if same_clip && current.frame.abs_diff(result.pose.frame) <= self.config.same_pose_frame_tolerance {
                log::trace!("search kept {:?} (cost {})", current, result.cost);
                return Ok(());
            }
        }
        log::debug!("switching to {:?} (cost {})", result.pose, result.cost);
        self.generator.request_pose(result.pose)
    }
}
