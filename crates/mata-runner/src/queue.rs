//! Queue runner — submits ingestion jobs to the worker fleet over NATS
//! JetStream.

use async_nats::jetstream;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use mata_model::{FeatureSetRef, Job, JobStatus, RunnerType, Source};

use crate::{JobManager, RunnerError};

pub const RUNNER_STREAM: &str = "MATA_RUNNER";
pub const RUNNER_SUBJECT: &str = "mata.runner.jobs";
const STATUS_SUBJECT_PREFIX: &str = "mata.runner.status.";

/// Control messages consumed by ingestion workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunnerMessage {
    /// Launch an ingestion job for a (source, store) pair.
    Start {
        job_id: Uuid,
        ext_id: String,
        source: Source,
        store_name: String,
        feature_sets: Vec<FeatureSetRef>,
    },
    /// Stop a running ingestion job.
    Abort { job_id: Uuid, ext_id: String },
}

/// Reply to a status probe on `mata.runner.status.<ext_id>`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: JobStatus,
}

/// [`JobManager`] backed by the NATS ingestion work queue.
pub struct QueueRunner {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl QueueRunner {
    /// Connect to NATS and ensure the runner stream exists.
    pub async fn connect(nats_url: &str) -> Result<Self, RunnerError> {
        let client = async_nats::connect(nats_url)
            .await
            .map_err(|e| RunnerError::SubmitFailed(e.to_string()))?;
        let jetstream = jetstream::new(client.clone());

        jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: RUNNER_STREAM.to_string(),
                subjects: vec![RUNNER_SUBJECT.to_string()],
                retention: jetstream::stream::RetentionPolicy::WorkQueue,
                ..Default::default()
            })
            .await
            .map_err(|e| RunnerError::SubmitFailed(e.to_string()))?;

        Ok(QueueRunner { client, jetstream })
    }

    /// Publish and wait for the broker to acknowledge the message.
    async fn publish(&self, msg: &RunnerMessage) -> Result<(), RunnerError> {
        let payload =
            serde_json::to_vec(msg).map_err(|e| RunnerError::SubmitFailed(e.to_string()))?;
        self.jetstream
            .publish(RUNNER_SUBJECT, payload.into())
            .await
            .map_err(|e| RunnerError::SubmitFailed(e.to_string()))?
            .await
            .map_err(|e| RunnerError::SubmitFailed(e.to_string()))?;
        Ok(())
    }
}

/// Workers identify jobs by this handle; derived from the job id so a
/// resubmitted job never spawns a second external job.
fn ext_id_for(job: &Job) -> String {
    format!("ingest-{}", job.id)
}

#[async_trait]
impl JobManager for QueueRunner {
    fn runner_type(&self) -> RunnerType {
        RunnerType::Queue
    }

    async fn start_job(&self, mut job: Job) -> Job {
        if !job.ext_id.is_empty() && job.status == JobStatus::Running {
            return job;
        }

        let ext_id = ext_id_for(&job);
        let msg = RunnerMessage::Start {
            job_id: job.id,
            ext_id: ext_id.clone(),
            source: job.source.clone(),
            store_name: job.store_name.clone(),
            feature_sets: job.feature_sets.iter().cloned().collect(),
        };

        match self.publish(&msg).await {
            Ok(()) => {
                info!("Submitted job {} as {}", job.id, ext_id);
                job.ext_id = ext_id;
                job.status = JobStatus::Running;
            }
            Err(e) => {
                warn!("Failed to submit job {}: {}", job.id, e);
                job.status = JobStatus::Error;
            }
        }
        job.updated_at = Utc::now();
        job
    }

    async fn abort_job(&self, mut job: Job) -> Result<Job, RunnerError> {
        let msg = RunnerMessage::Abort {
            job_id: job.id,
            ext_id: job.ext_id.clone(),
        };
        self.publish(&msg).await?;

        info!("Requested abort of job {} ({})", job.id, job.ext_id);
        job.status = JobStatus::Aborting;
        job.updated_at = Utc::now();
        Ok(job)
    }

    async fn get_job_status(&self, job: &Job) -> Result<JobStatus, RunnerError> {
        if job.ext_id.is_empty() {
            return Ok(job.status);
        }

        let subject = format!("{}{}", STATUS_SUBJECT_PREFIX, job.ext_id);
        let reply = self
            .client
            .request(subject, Vec::new().into())
            .await
            .map_err(|e| RunnerError::StatusUnavailable(e.to_string()))?;
        let reply: StatusReply = serde_json::from_slice(&reply.payload)
            .map_err(|e| RunnerError::StatusUnavailable(e.to_string()))?;
        Ok(reply.status)
    }
}
