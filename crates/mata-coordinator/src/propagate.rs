//! Spec propagation — push updated feature-set specs to running jobs.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use mata_bus::SpecPublisher;
use mata_model::{DeliveryStatus, FeatureSetStatus, JobStatus};
use mata_registry::{FeatureSetRepository, JobRepository};

use crate::error::CoordinatorError;

/// What one propagation tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationSummary {
    /// Feature sets whose spec went out this tick.
    pub published: usize,
    /// Publishes the broker did not acknowledge; links untouched, retried
    /// next tick.
    pub failed: usize,
    /// Pending feature sets with nothing left to publish.
    pub up_to_date: usize,
}

/// Publishes the spec of every pending feature set whose version has not
/// yet been pushed to all of its live jobs.
pub struct SpecPropagator {
    feature_sets: Arc<dyn FeatureSetRepository>,
    jobs: Arc<dyn JobRepository>,
    publisher: Arc<dyn SpecPublisher>,
}

impl SpecPropagator {
    pub fn new(
        feature_sets: Arc<dyn FeatureSetRepository>,
        jobs: Arc<dyn JobRepository>,
        publisher: Arc<dyn SpecPublisher>,
    ) -> Self {
        SpecPropagator {
            feature_sets,
            jobs,
            publisher,
        }
    }

    /// Run one propagation tick over all pending feature sets.
    ///
    /// A single publish per feature set notifies every attached job (the
    /// ingestion side fans out by subscription); the per-link version
    /// update records which version this coordinator considers published
    /// to each job. Links to terminal jobs are skipped and never mutated.
    /// A pending feature set with no live jobs at all is not published
    /// and stays pending.
    pub async fn publish_pending(&self) -> Result<PropagationSummary, CoordinatorError> {
        let pending = self
            .feature_sets
            .find_by_status(FeatureSetStatus::Pending)
            .await?;
        let mut summary = PropagationSummary::default();
        if pending.is_empty() {
            return Ok(summary);
        }

        let ids: Vec<Uuid> = pending
            .iter()
            .flat_map(|fs| fs.job_statuses.iter().map(|l| l.job_id))
            .collect();
        let statuses: HashMap<Uuid, JobStatus> = self
            .jobs
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|j| (j.id, j.status))
            .collect();

        for mut fs in pending {
            let version = fs.version;
            let stale: Vec<usize> = fs
                .job_statuses
                .iter()
                .enumerate()
                .filter(|(_, link)| match statuses.get(&link.job_id) {
                    Some(status) if !status.is_terminal() => link.version != version,
                    _ => false,
                })
                .map(|(idx, _)| idx)
                .collect();

            if stale.is_empty() {
                summary.up_to_date += 1;
                continue;
            }

            let key = fs.reference().to_string();
            match self.publisher.publish_spec(&key, &fs.spec()).await {
                Ok(()) => {
                    for idx in stale {
                        let link = &mut fs.job_statuses[idx];
                        link.version = version;
                        link.delivery_status = DeliveryStatus::InProgress;
                    }
                    self.feature_sets.save(&fs).await?;
                    summary.published += 1;
                    info!("Published spec {} at version {}", key, version);
                }
                Err(e) => {
                    // Broker rejection, timeout and cancellation all land
                    // here; the links stay untouched for the next tick.
                    warn!("Failed to publish spec {}: {}", key, e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}
