//! Upstream source descriptors and their business identity.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of upstream stream a feature set is ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Kafka,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Kafka => "kafka",
        }
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kafka" => Ok(SourceType::Kafka),
            other => Err(format!("unknown source type: {}", other)),
        }
    }
}

/// Type-specific source configuration (bootstrap servers + topic for Kafka).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceConfig {
    pub bootstrap_servers: String,
    pub topic: String,
}

/// Business key of a source. The surrogate persistence id never
/// participates in coordination equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceKey {
    pub source_type: SourceType,
    pub config: SourceConfig,
}

/// An upstream stream from which feature sets are ingested.
///
/// Two `Source` values with the same `(source_type, config)` are the same
/// source for coordination purposes even when their surrogate ids differ;
/// `PartialEq` reflects that. Use [`Source::key`] to key groupings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Surrogate persistence id; `None` until persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub source_type: SourceType,
    pub config: SourceConfig,
}

impl Source {
    pub fn kafka(bootstrap_servers: impl Into<String>, topic: impl Into<String>) -> Self {
        Source {
            id: None,
            source_type: SourceType::Kafka,
            config: SourceConfig {
                bootstrap_servers: bootstrap_servers.into(),
                topic: topic.into(),
            },
        }
    }

    pub fn key(&self) -> SourceKey {
        SourceKey {
            source_type: self.source_type,
            config: self.config.clone(),
        }
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.source_type == other.source_type && self.config == other.config
    }
}

impl Eq for Source {}
