//! Ack listener — folds delivery acknowledgements into feature-set state.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use mata_bus::AckMessage;
use mata_model::{DeliveryStatus, FeatureSetRef, FeatureSetStatus};
use mata_registry::{FeatureSetRepository, JobRepository};

use crate::error::CoordinatorError;

/// One record from the ack channel. Both key and payload arrive from an
/// untrusted shared topic; every field is validated before use.
#[derive(Debug, Clone)]
pub struct AckRecord {
    /// `project/name` key of the acknowledged feature set.
    pub key: String,
    pub feature_set_version: i32,
    pub job_name: String,
}

impl From<AckMessage> for AckRecord {
    fn from(msg: AckMessage) -> Self {
        AckRecord {
            key: msg.feature_set_reference,
            feature_set_version: msg.feature_set_version,
            job_name: msg.job_name,
        }
    }
}

/// Why a record was dropped without touching any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    MalformedKey,
    UnknownFeatureSet,
    EmptyJobName,
    NegativeVersion,
    UnknownJob,
    StaleVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The link was marked delivered; undelivered links remain.
    Applied,
    /// The link was marked delivered and the feature set promoted to
    /// ready.
    Promoted,
    /// The record failed validation; nothing was mutated.
    Discarded(DiscardReason),
}

/// Applies ack records to the delivery-status state machine and derives
/// the feature-set status from its links.
pub struct AckListener {
    feature_sets: Arc<dyn FeatureSetRepository>,
    jobs: Arc<dyn JobRepository>,
}

impl AckListener {
    pub fn new(feature_sets: Arc<dyn FeatureSetRepository>, jobs: Arc<dyn JobRepository>) -> Self {
        AckListener { feature_sets, jobs }
    }

    /// Process one ack record. Malformed, unknown and stale records are
    /// silently discarded; only registry failures surface.
    pub async fn process(&self, record: &AckRecord) -> Result<AckOutcome, CoordinatorError> {
        let Some(reference) = FeatureSetRef::parse(&record.key) else {
            debug!("Discarding ack with malformed key {:?}", record.key);
            return Ok(AckOutcome::Discarded(DiscardReason::MalformedKey));
        };

        let Some(mut fs) = self
            .feature_sets
            .find(&reference.project, &reference.name)
            .await?
        else {
            return Ok(AckOutcome::Discarded(DiscardReason::UnknownFeatureSet));
        };

        if record.job_name.is_empty() {
            return Ok(AckOutcome::Discarded(DiscardReason::EmptyJobName));
        }
        if record.feature_set_version < 0 {
            return Ok(AckOutcome::Discarded(DiscardReason::NegativeVersion));
        }
        let Ok(job_id) = Uuid::parse_str(&record.job_name) else {
            return Ok(AckOutcome::Discarded(DiscardReason::UnknownJob));
        };

        let version = fs.version;
        {
            let Some(link) = fs.job_status_mut(job_id) else {
                return Ok(AckOutcome::Discarded(DiscardReason::UnknownJob));
            };
            if i64::from(record.feature_set_version) != version {
                return Ok(AckOutcome::Discarded(DiscardReason::StaleVersion));
            }
            link.delivery_status = DeliveryStatus::Delivered;
        }

        // Promotion is derived data: ready once every link belonging to a
        // live job is delivered at the current version. Links of terminal
        // (or vanished) jobs are ignored.
        let ids: Vec<Uuid> = fs.job_statuses.iter().map(|l| l.job_id).collect();
        let live: HashSet<Uuid> = self
            .jobs
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .filter(|j| !j.status.is_terminal())
            .map(|j| j.id)
            .collect();

        let eligible: Vec<_> = fs
            .job_statuses
            .iter()
            .filter(|l| live.contains(&l.job_id))
            .collect();
        let promoted = !eligible.is_empty()
            && eligible
                .iter()
                .all(|l| l.delivery_status == DeliveryStatus::Delivered && l.version == version);

        if promoted {
            fs.status = FeatureSetStatus::Ready;
        }
        self.feature_sets.save(&fs).await?;

        if promoted {
            info!("Feature set {} ready at version {}", reference, version);
            Ok(AckOutcome::Promoted)
        } else {
            Ok(AckOutcome::Applied)
        }
    }
}
