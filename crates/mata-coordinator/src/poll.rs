//! Reconciliation pass — one running ingestion job per (source, store)
//! pair implied by the registered feature sets and store subscriptions.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use mata_model::{FeatureSet, FeatureSetRef, Job, JobKey, JobStatus, Source, Store};
use mata_registry::{
    FeatureSetFilter, FeatureSetRepository, JobRepository, SourceRepository, SpecService,
    StoreFilter,
};
use mata_runner::JobManager;

use crate::error::CoordinatorError;

/// What one reconcile pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Jobs submitted to the backend this pass (including failed starts,
    /// which persist in `Error`).
    pub started: usize,
    /// Existing jobs left running unchanged.
    pub reused: usize,
    /// Surplus jobs successfully handed to the backend for abort.
    pub aborted: usize,
}

/// The desired job for one `(source, store)` business key.
struct JobGroup {
    source: Source,
    store_name: String,
    feature_sets: BTreeMap<FeatureSetRef, FeatureSet>,
}

/// Drives the desired state "exactly one non-terminal job per implied
/// (source, store) pair" against the execution backend. Each call to
/// [`poll`](JobCoordinator::poll) is an independent, idempotent pass.
pub struct JobCoordinator {
    spec_service: Arc<dyn SpecService>,
    sources: Arc<dyn SourceRepository>,
    feature_sets: Arc<dyn FeatureSetRepository>,
    jobs: Arc<dyn JobRepository>,
    job_manager: Arc<dyn JobManager>,
    job_update_timeout: Duration,
}

impl JobCoordinator {
    pub fn new(
        spec_service: Arc<dyn SpecService>,
        sources: Arc<dyn SourceRepository>,
        feature_sets: Arc<dyn FeatureSetRepository>,
        jobs: Arc<dyn JobRepository>,
        job_manager: Arc<dyn JobManager>,
        job_update_timeout: Duration,
    ) -> Self {
        JobCoordinator {
            spec_service,
            sources,
            feature_sets,
            jobs,
            job_manager,
            job_update_timeout,
        }
    }

    /// Run one reconcile pass. Any registry failure aborts the pass
    /// before persistence; the next tick re-runs it from scratch.
    pub async fn poll(&self) -> Result<PollSummary, CoordinatorError> {
        let stores = self.spec_service.list_stores(&StoreFilter::default()).await?;
        if stores.is_empty() {
            return Ok(PollSummary::default());
        }

        let pairs = self.collect_pairs(&stores).await?;
        if pairs.is_empty() {
            return Ok(PollSummary::default());
        }

        // Snapshot before any mutation: a job started later in this pass
        // must never be treated as its own duplicate.
        let running_before = self.jobs.find_by_status(JobStatus::Running).await?;

        let pairs = self.canonicalize(pairs).await?;
        let groups = group_pairs(pairs);

        let mut summary = PollSummary::default();
        let mut batch: Vec<Job> = Vec::new();
        let mut touched: BTreeMap<FeatureSetRef, FeatureSet> = BTreeMap::new();
        let mut distinguished: HashMap<JobKey, Uuid> = HashMap::new();

        for (key, group) in &groups {
            let desired: BTreeSet<FeatureSetRef> = group.feature_sets.keys().cloned().collect();

            let job = match self.jobs.find_latest_non_terminal(key).await? {
                Some(existing) if existing.feature_sets == desired => {
                    summary.reused += 1;
                    existing
                }
                _ => {
                    let fresh = Job::new(
                        self.job_manager.runner_type(),
                        group.source.clone(),
                        group.store_name.clone(),
                        desired,
                    );
                    summary.started += 1;
                    self.start_with_timeout(fresh).await
                }
            };

            // Every member feature set holds a delivery link to the job
            // it now belongs to.
            for fs in group.feature_sets.values() {
                let reference = fs.reference();
                if let Some(entry) = touched.get_mut(&reference) {
                    entry.attach_job(job.id);
                    continue;
                }
                let mut copy = fs.clone();
                if copy.attach_job(job.id) {
                    touched.insert(reference, copy);
                }
            }

            distinguished.insert(key.clone(), job.id);
            batch.push(job);
        }

        // Abort duplicates: every running job observed before this pass
        // that shares a group's key but is not that group's job.
        let mut handled: HashSet<Uuid> = HashSet::new();
        for (key, keep) in &distinguished {
            for surplus in running_before
                .iter()
                .filter(|j| j.key() == *key && j.id != *keep)
            {
                if !handled.insert(surplus.id) {
                    continue;
                }
                match timeout(
                    self.job_update_timeout,
                    self.job_manager.abort_job(surplus.clone()),
                )
                .await
                {
                    Ok(Ok(aborted)) => {
                        batch.push(aborted);
                        summary.aborted += 1;
                    }
                    Ok(Err(e)) => warn!("Failed to abort job {}: {}", surplus.id, e),
                    Err(_) => warn!("Abort of job {} timed out", surplus.id),
                }
            }
        }

        self.jobs.save_all(&batch).await?;
        for fs in touched.values() {
            self.feature_sets.save(fs).await?;
        }

        info!(
            "Reconcile pass: {} started, {} reused, {} aborted",
            summary.started, summary.reused, summary.aborted
        );
        Ok(summary)
    }

    /// Expand every store subscription into (feature set, store) pairs.
    /// A feature set may legitimately pair with several stores; the same
    /// pair arising from overlapping subscriptions counts once.
    async fn collect_pairs(
        &self,
        stores: &[Store],
    ) -> Result<Vec<(FeatureSet, String)>, CoordinatorError> {
        let mut seen: HashSet<(FeatureSetRef, String)> = HashSet::new();
        let mut pairs = Vec::new();

        for store in stores {
            for sub in &store.subscriptions {
                let filter = FeatureSetFilter::new(sub.project.clone(), sub.name.clone());
                for fs in self.spec_service.list_feature_sets(&filter).await? {
                    if seen.insert((fs.reference(), store.name.clone())) {
                        pairs.push((fs, store.name.clone()));
                    }
                }
            }
        }
        Ok(pairs)
    }

    /// Collapse in-memory duplicate sources onto their earliest-persisted
    /// record, so value-identical sources group under one job key.
    async fn canonicalize(
        &self,
        mut pairs: Vec<(FeatureSet, String)>,
    ) -> Result<Vec<(FeatureSet, String)>, CoordinatorError> {
        let mut canonical: HashMap<mata_model::SourceKey, Source> = HashMap::new();

        for (fs, _) in &pairs {
            let key = fs.source.key();
            if canonical.contains_key(&key) {
                continue;
            }
            if let Some(source) = self
                .sources
                .find_canonical(key.source_type, &key.config)
                .await?
            {
                canonical.insert(key, source);
            }
        }

        for (fs, _) in &mut pairs {
            if let Some(source) = canonical.get(&fs.source.key()) {
                fs.source = source.clone();
            }
        }
        Ok(pairs)
    }

    async fn start_with_timeout(&self, job: Job) -> Job {
        let mut fallback = job.clone();
        match timeout(self.job_update_timeout, self.job_manager.start_job(job)).await {
            Ok(started) => started,
            Err(_) => {
                warn!("Start of job {} timed out", fallback.id);
                fallback.status = JobStatus::Error;
                fallback.updated_at = Utc::now();
                fallback
            }
        }
    }
}

/// Group pairs by `(source business key, store name)`; each group is at
/// most one desired job.
fn group_pairs(pairs: Vec<(FeatureSet, String)>) -> BTreeMap<JobKey, JobGroup> {
    let mut groups: BTreeMap<JobKey, JobGroup> = BTreeMap::new();

    for (fs, store_name) in pairs {
        let key = JobKey {
            source: fs.source.key(),
            store_name: store_name.clone(),
        };
        let group = groups.entry(key).or_insert_with(|| JobGroup {
            source: fs.source.clone(),
            store_name,
            feature_sets: BTreeMap::new(),
        });
        group.feature_sets.entry(fs.reference()).or_insert(fs);
    }
    groups
}
