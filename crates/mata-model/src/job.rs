//! Ingestion job handles and their lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

use crate::feature_set::FeatureSetRef;
use crate::source::{Source, SourceKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Aborting,
    Aborted,
    Error,
    Completed,
}

impl JobStatus {
    /// No forward transition happens out of a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Aborted | JobStatus::Error | JobStatus::Completed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Aborting => "aborting",
            JobStatus::Aborted => "aborted",
            JobStatus::Error => "error",
            JobStatus::Completed => "completed",
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "aborting" => Ok(JobStatus::Aborting),
            "aborted" => Ok(JobStatus::Aborted),
            "error" => Ok(JobStatus::Error),
            "completed" => Ok(JobStatus::Completed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// Which execution backend a job was submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerType {
    Queue,
}

impl RunnerType {
    pub fn as_str(self) -> &'static str {
        match self {
            RunnerType::Queue => "queue",
        }
    }
}

impl FromStr for RunnerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue" => Ok(RunnerType::Queue),
            other => Err(format!("unknown runner type: {}", other)),
        }
    }
}

/// Dedup business key: at most one non-terminal job exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub source: SourceKey,
    pub store_name: String,
}

/// Handle on one ingestion job in the execution backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Coordinator-assigned id; what delivery links point at.
    pub id: Uuid,
    /// Runner-assigned handle; empty until the job has been started.
    pub ext_id: String,
    pub runner: RunnerType,
    pub source: Source,
    pub store_name: String,
    pub status: JobStatus,
    /// Mirror of the feature sets attached through their delivery links,
    /// kept for traversal and membership comparison.
    pub feature_sets: BTreeSet<FeatureSetRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        runner: RunnerType,
        source: Source,
        store_name: impl Into<String>,
        feature_sets: BTreeSet<FeatureSetRef>,
    ) -> Self {
        let now = Utc::now();
        Job {
            id: Uuid::new_v4(),
            ext_id: String::new(),
            runner,
            source,
            store_name: store_name.into(),
            status: JobStatus::Pending,
            feature_sets,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey {
            source: self.source.key(),
            store_name: self.store_name.clone(),
        }
    }
}
