//! Store (sink) descriptors and feature-set subscriptions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The wildcard accepted in subscription fields.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    Redis,
}

impl StoreType {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreType::Redis => "redis",
        }
    }
}

impl FromStr for StoreType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redis" => Ok(StoreType::Redis),
            other => Err(format!("unknown store type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
}

/// A (project, name) predicate attached to a store. A field matches when
/// it is the wildcard or equal to the candidate value; `*` may also stand
/// in for a run of characters (translated to `%` at the query layer).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    pub project: String,
    pub name: String,
}

impl Subscription {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Subscription {
            project: project.into(),
            name: name.into(),
        }
    }

    /// Does this subscription select the given feature set?
    pub fn matches(&self, project: &str, name: &str) -> bool {
        wildcard_match(&self.project, project) && wildcard_match(&self.name, name)
    }
}

/// `LIKE`-style wildcard match: `*` matches any run of characters, every
/// other character matches literally.
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == value;
    }

    let segments: Vec<&str> = pattern.split('*').collect();
    let mut rest = value;

    let first = segments[0];
    if !rest.starts_with(first) {
        return false;
    }
    rest = &rest[first.len()..];

    for seg in &segments[1..segments.len() - 1] {
        if seg.is_empty() {
            continue;
        }
        match rest.find(seg) {
            Some(idx) => rest = &rest[idx + seg.len()..],
            None => return false,
        }
    }

    rest.ends_with(segments[segments.len() - 1])
}

/// A downstream sink serving ingested features, with the subscriptions
/// that select which feature sets it consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    /// Unique store name; part of the job dedup key.
    pub name: String,
    pub store_type: StoreType,
    pub config: StoreConfig,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

impl Store {
    pub fn redis(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Store {
            name: name.into(),
            store_type: StoreType::Redis,
            config: StoreConfig {
                host: host.into(),
                port,
            },
            subscriptions: Vec::new(),
        }
    }

    pub fn with_subscription(mut self, project: &str, name: &str) -> Self {
        self.subscriptions.push(Subscription::new(project, name));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_anything() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("*", ""));
    }

    #[test]
    fn literal_patterns_match_exactly() {
        assert!(wildcard_match("features1", "features1"));
        assert!(!wildcard_match("features1", "features2"));
    }

    #[test]
    fn embedded_wildcards_match_like_style() {
        assert!(wildcard_match("fs_*", "fs_ratings"));
        assert!(!wildcard_match("fs_*", "ratings"));
        assert!(wildcard_match("*_daily", "ratings_daily"));
        assert!(wildcard_match("fs_*_daily", "fs_ratings_daily"));
        assert!(!wildcard_match("fs_*_daily", "fs_ratings_hourly"));
    }

    #[test]
    fn subscription_applies_both_fields() {
        let sub = Subscription::new("project1", "*");
        assert!(sub.matches("project1", "features1"));
        assert!(sub.matches("project1", "features2"));
        assert!(!sub.matches("project2", "features1"));
    }
}
