//! In-memory registry, runner and bus fakes shared by the coordinator
//! integration tests.

// Not every test binary exercises every fake.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{Duration as ChronoDuration, Utc};
use uuid::Uuid;

use mata_bus::{BusError, SpecPublisher};
use mata_model::{
    wildcard_match, FeatureSet, FeatureSetRef, FeatureSetSpec, FeatureSetStatus, Job, JobKey,
    JobStatus, RunnerType, Source, SourceConfig, SourceType, Store,
};
use mata_registry::{
    FeatureSetRepository, JobRepository, RegistryError, SourceRepository, StoreRepository,
};
use mata_runner::{JobManager, RunnerError};

// --- Registry fake ---

/// Backing state for all four repository traits, with enough recording
/// to assert "no writes happened".
#[derive(Default)]
pub struct InMemoryRegistry {
    pub stores: Mutex<Vec<Store>>,
    pub sources: Mutex<Vec<Source>>,
    pub feature_sets: Mutex<Vec<FeatureSet>>,
    pub jobs: Mutex<Vec<Job>>,
    pub job_batches_saved: AtomicUsize,
    pub feature_sets_saved: AtomicUsize,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_store(&self, store: Store) {
        self.stores.lock().unwrap().push(store);
    }

    /// Persist a source, assigning the next surrogate id. Returns the
    /// stored record.
    pub fn add_source(&self, mut source: Source) -> Source {
        let mut sources = self.sources.lock().unwrap();
        source.id = Some(sources.len() as i64 + 1);
        sources.push(source.clone());
        source
    }

    pub fn add_feature_set(&self, feature_set: FeatureSet) {
        self.feature_sets.lock().unwrap().push(feature_set);
    }

    pub fn add_job(&self, job: Job) {
        self.jobs.lock().unwrap().push(job);
    }

    pub fn job(&self, id: Uuid) -> Option<Job> {
        self.jobs.lock().unwrap().iter().find(|j| j.id == id).cloned()
    }

    pub fn feature_set(&self, project: &str, name: &str) -> Option<FeatureSet> {
        self.feature_sets
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.project == project && f.name == name)
            .cloned()
    }

    pub fn jobs_with_status(&self, status: JobStatus) -> Vec<Job> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.status == status)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StoreRepository for InMemoryRegistry {
    async fn list_stores(&self) -> Result<Vec<Store>, RegistryError> {
        Ok(self.stores.lock().unwrap().clone())
    }
}

#[async_trait]
impl SourceRepository for InMemoryRegistry {
    async fn find_canonical(
        &self,
        source_type: SourceType,
        config: &SourceConfig,
    ) -> Result<Option<Source>, RegistryError> {
        let sources = self.sources.lock().unwrap();
        Ok(sources
            .iter()
            .filter(|s| s.source_type == source_type && s.config == *config)
            .min_by_key(|s| s.id)
            .cloned())
    }
}

#[async_trait]
impl FeatureSetRepository for InMemoryRegistry {
    async fn list(
        &self,
        project_glob: &str,
        name_glob: &str,
    ) -> Result<Vec<FeatureSet>, RegistryError> {
        let mut matching: Vec<FeatureSet> = self
            .feature_sets
            .lock()
            .unwrap()
            .iter()
            .filter(|f| {
                wildcard_match(project_glob, &f.project) && wildcard_match(name_glob, &f.name)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matching)
    }

    async fn find_by_status(
        &self,
        status: FeatureSetStatus,
    ) -> Result<Vec<FeatureSet>, RegistryError> {
        Ok(self
            .feature_sets
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.status == status)
            .cloned()
            .collect())
    }

    async fn find(&self, project: &str, name: &str) -> Result<Option<FeatureSet>, RegistryError> {
        Ok(self.feature_set(project, name))
    }

    async fn save(&self, feature_set: &FeatureSet) -> Result<(), RegistryError> {
        self.feature_sets_saved.fetch_add(1, Ordering::SeqCst);
        let mut feature_sets = self.feature_sets.lock().unwrap();
        match feature_sets
            .iter_mut()
            .find(|f| f.project == feature_set.project && f.name == feature_set.name)
        {
            Some(existing) => *existing = feature_set.clone(),
            None => feature_sets.push(feature_set.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl JobRepository for InMemoryRegistry {
    async fn find_latest_non_terminal(
        &self,
        key: &JobKey,
    ) -> Result<Option<Job>, RegistryError> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| !j.status.is_terminal() && j.key() == *key)
            .max_by_key(|(idx, j)| (j.updated_at, *idx))
            .map(|(_, j)| j.clone()))
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>, RegistryError> {
        Ok(self.jobs_with_status(status))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Job>, RegistryError> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs.iter().filter(|j| ids.contains(&j.id)).cloned().collect())
    }

    async fn save_all(&self, batch: &[Job]) -> Result<(), RegistryError> {
        self.job_batches_saved.fetch_add(1, Ordering::SeqCst);
        let mut jobs = self.jobs.lock().unwrap();
        for job in batch {
            match jobs.iter_mut().find(|j| j.id == job.id) {
                Some(existing) => *existing = job.clone(),
                None => jobs.push(job.clone()),
            }
        }
        Ok(())
    }
}

// --- Runner fake ---

/// Records every start/abort; optionally fails all starts.
#[derive(Default)]
pub struct RecordingJobManager {
    pub started: Mutex<Vec<Job>>,
    pub aborted: Mutex<Vec<Job>>,
    pub fail_starts: AtomicBool,
}

impl RecordingJobManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_calls(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn abort_calls(&self) -> usize {
        self.aborted.lock().unwrap().len()
    }
}

#[async_trait]
impl JobManager for RecordingJobManager {
    fn runner_type(&self) -> RunnerType {
        RunnerType::Queue
    }

    async fn start_job(&self, mut job: Job) -> Job {
        self.started.lock().unwrap().push(job.clone());
        if self.fail_starts.load(Ordering::SeqCst) {
            job.status = JobStatus::Error;
        } else {
            job.ext_id = format!("ext-{}", job.id);
            job.status = JobStatus::Running;
        }
        job.updated_at = Utc::now();
        job
    }

    async fn abort_job(&self, mut job: Job) -> Result<Job, RunnerError> {
        self.aborted.lock().unwrap().push(job.clone());
        job.status = JobStatus::Aborted;
        job.updated_at = Utc::now();
        Ok(job)
    }

    async fn get_job_status(&self, job: &Job) -> Result<JobStatus, RunnerError> {
        Ok(job.status)
    }
}

// --- Bus fake ---

/// Records every broker-acknowledged publish; optionally refuses all.
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(String, FeatureSetSpec)>>,
    pub fail_publishes: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_calls(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl SpecPublisher for RecordingPublisher {
    async fn publish_spec(&self, key: &str, spec: &FeatureSetSpec) -> Result<(), BusError> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(BusError::PublishFailed("publish cancelled".to_string()));
        }
        self.published
            .lock()
            .unwrap()
            .push((key.to_string(), spec.clone()));
        Ok(())
    }
}

// --- Fixtures ---

pub fn kafka_source(topic: &str) -> Source {
    Source::kafka("broker:9092", topic)
}

pub fn feature_set(project: &str, name: &str, source: Source) -> FeatureSet {
    FeatureSet::new(project, name, source)
}

/// A running job for the given source/store carrying the given feature
/// sets, with `updated_at` shifted so recency is deterministic.
pub fn running_job(source: Source, store_name: &str, refs: &[FeatureSetRef], age_secs: i64) -> Job {
    let mut job = Job::new(
        RunnerType::Queue,
        source,
        store_name,
        refs.iter().cloned().collect::<BTreeSet<_>>(),
    );
    job.ext_id = format!("ext-{}", job.id);
    job.status = JobStatus::Running;
    job.updated_at = Utc::now() - ChronoDuration::seconds(age_secs);
    job
}
