//! Mata Runner - adapters to the job-execution backend
//!
//! The coordinator only ever talks to [`JobManager`]; dispatch over
//! concrete backends lives here. [`queue`] submits jobs to the ingestion
//! work queue over NATS JetStream.

pub mod queue;

use async_trait::async_trait;
use std::fmt;

use mata_model::{Job, JobStatus, RunnerType};

/// Errors surfaced by a runner adapter.
#[derive(Debug)]
pub enum RunnerError {
    /// Submitting a start/abort message to the backend failed.
    SubmitFailed(String),
    /// The backend did not answer a status probe.
    StatusUnavailable(String),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::SubmitFailed(msg) => write!(f, "submit failed: {}", msg),
            RunnerError::StatusUnavailable(msg) => write!(f, "status unavailable: {}", msg),
        }
    }
}

impl std::error::Error for RunnerError {}

/// Start, abort and observe one ingestion job in the execution backend.
#[async_trait]
pub trait JobManager: Send + Sync {
    /// Stamped onto jobs created for this backend.
    fn runner_type(&self) -> RunnerType;

    /// Start a pending job. Failure is carried in the returned job's
    /// status (`Error`), never as an `Err`. Idempotent per job id: a job
    /// that already runs with an ext id is returned unchanged.
    async fn start_job(&self, job: Job) -> Job;

    /// Ask the backend to abort a non-terminal job. The returned job is
    /// `Aborting` or `Aborted`; the backend eventually drives it to
    /// `Aborted`.
    async fn abort_job(&self, job: Job) -> Result<Job, RunnerError>;

    /// Observe the backend's view of a job. Never mutates anything.
    async fn get_job_status(&self, job: &Job) -> Result<JobStatus, RunnerError>;
}
