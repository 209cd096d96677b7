//! Feature sets, their delivery links to jobs, and the spec payload
//! published on the message bus.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::source::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSetStatus {
    /// The current version has not yet been confirmed by every attached job.
    Pending,
    /// Every non-terminal job has acknowledged the current version.
    Ready,
}

impl FeatureSetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureSetStatus::Pending => "pending",
            FeatureSetStatus::Ready => "ready",
        }
    }
}

impl FromStr for FeatureSetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FeatureSetStatus::Pending),
            "ready" => Ok(FeatureSetStatus::Ready),
            other => Err(format!("unknown feature set status: {}", other)),
        }
    }
}

/// Whether a published spec version has been acknowledged by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    InProgress,
    Delivered,
}

/// `project/name` identity of a feature set, as used for message-bus keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureSetRef {
    pub project: String,
    pub name: String,
}

impl FeatureSetRef {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        FeatureSetRef {
            project: project.into(),
            name: name.into(),
        }
    }

    /// Parse a `project/name` key. Anything that is not exactly two
    /// non-empty segments is rejected.
    pub fn parse(key: &str) -> Option<Self> {
        let parts: Vec<&str> = key.split('/').collect();
        match parts.as_slice() {
            [project, name] if !project.is_empty() && !name.is_empty() => {
                Some(FeatureSetRef::new(*project, *name))
            }
            _ => None,
        }
    }
}

impl fmt::Display for FeatureSetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.name)
    }
}

/// Value types a field can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bytes,
    String,
    Int32,
    Int64,
    Float,
    Double,
    Bool,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub value_type: ValueType,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        FieldSpec {
            name: name.into(),
            value_type,
        }
    }
}

/// The schema payload pushed to running ingestion jobs over the spec
/// channel when a feature set changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSetSpec {
    pub project: String,
    pub name: String,
    pub version: i64,
    pub entities: Vec<FieldSpec>,
    pub features: Vec<FieldSpec>,
    pub source: Source,
}

/// Per-(feature set, job) delivery record. Owned by the feature set; the
/// job is held by id only, never by containment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSetJobStatus {
    pub job_id: Uuid,
    /// Feature-set version most recently published to the job. Zero until
    /// the first publish.
    pub version: i64,
    pub delivery_status: DeliveryStatus,
}

/// A named, versioned schema describing a group of features ingested
/// together from one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Surrogate persistence id; `None` until persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub project: String,
    pub name: String,
    /// Monotonically increasing; bumped by the registry, never by the
    /// coordinator.
    pub version: i64,
    pub status: FeatureSetStatus,
    pub source: Source,
    pub entities: Vec<FieldSpec>,
    pub features: Vec<FieldSpec>,
    /// Delivery links to ingestion jobs. The single source of truth for
    /// per-job delivery state.
    #[serde(default)]
    pub job_statuses: Vec<FeatureSetJobStatus>,
}

impl FeatureSet {
    pub fn new(project: impl Into<String>, name: impl Into<String>, source: Source) -> Self {
        FeatureSet {
            id: None,
            project: project.into(),
            name: name.into(),
            version: 1,
            status: FeatureSetStatus::Pending,
            source,
            entities: Vec::new(),
            features: Vec::new(),
            job_statuses: Vec::new(),
        }
    }

    pub fn reference(&self) -> FeatureSetRef {
        FeatureSetRef::new(self.project.clone(), self.name.clone())
    }

    pub fn spec(&self) -> FeatureSetSpec {
        FeatureSetSpec {
            project: self.project.clone(),
            name: self.name.clone(),
            version: self.version,
            entities: self.entities.clone(),
            features: self.features.clone(),
            source: self.source.clone(),
        }
    }

    pub fn job_status(&self, job_id: Uuid) -> Option<&FeatureSetJobStatus> {
        self.job_statuses.iter().find(|l| l.job_id == job_id)
    }

    pub fn job_status_mut(&mut self, job_id: Uuid) -> Option<&mut FeatureSetJobStatus> {
        self.job_statuses.iter_mut().find(|l| l.job_id == job_id)
    }

    /// Ensure a delivery link to the given job exists. Returns `true` when
    /// a link was added; an existing link is never touched.
    pub fn attach_job(&mut self, job_id: Uuid) -> bool {
        if self.job_status(job_id).is_some() {
            return false;
        }
        self.job_statuses.push(FeatureSetJobStatus {
            job_id,
            version: 0,
            delivery_status: DeliveryStatus::InProgress,
        });
        true
    }
}
