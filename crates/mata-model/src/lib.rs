//! Mata Model - entities shared across the coordinator
//!
//! This crate defines the persistent entities of the feature-ingestion
//! platform (sources, stores, feature sets, jobs) together with the
//! identity rules the coordinator relies on: sources compare by business
//! key, jobs deduplicate by `(source, store)`, and delivery state lives
//! on the feature-set side of the feature-set/job link.

pub mod feature_set;
pub mod job;
pub mod source;
pub mod store;

pub use feature_set::{
    DeliveryStatus, FeatureSet, FeatureSetJobStatus, FeatureSetRef, FeatureSetSpec,
    FeatureSetStatus, FieldSpec, ValueType,
};
pub use job::{Job, JobKey, JobStatus, RunnerType};
pub use source::{Source, SourceConfig, SourceKey, SourceType};
pub use store::{wildcard_match, Store, StoreConfig, StoreType, Subscription, WILDCARD};
