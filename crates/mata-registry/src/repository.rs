//! Query contracts the coordinator depends on.

use async_trait::async_trait;
use uuid::Uuid;

use mata_model::{
    FeatureSet, FeatureSetStatus, Job, JobKey, JobStatus, Source, SourceConfig, SourceType, Store,
};

use crate::error::RegistryError;

/// Read access to configured stores.
#[async_trait]
pub trait StoreRepository: Send + Sync {
    /// All stores, with their subscriptions.
    async fn list_stores(&self) -> Result<Vec<Store>, RegistryError>;
}

/// Read/write access to feature sets (including their embedded delivery
/// links, which only the coordinator mutates).
#[async_trait]
pub trait FeatureSetRepository: Send + Sync {
    /// Feature sets matching the (possibly wildcarded) project and name,
    /// ordered by name ascending. `*` stands for "any".
    async fn list(
        &self,
        project_glob: &str,
        name_glob: &str,
    ) -> Result<Vec<FeatureSet>, RegistryError>;

    async fn find_by_status(
        &self,
        status: FeatureSetStatus,
    ) -> Result<Vec<FeatureSet>, RegistryError>;

    async fn find(&self, project: &str, name: &str) -> Result<Option<FeatureSet>, RegistryError>;

    /// Upsert by `(project, name)`; persists status and delivery links in
    /// one statement.
    async fn save(&self, feature_set: &FeatureSet) -> Result<(), RegistryError>;
}

/// Source lookup used to collapse in-memory duplicates onto their
/// canonical persisted record.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// The earliest-persisted source with the given business key, if any
    /// (ordered by surrogate id ascending).
    async fn find_canonical(
        &self,
        source_type: SourceType,
        config: &SourceConfig,
    ) -> Result<Option<Source>, RegistryError>;
}

/// Read/write access to ingestion jobs.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// The most-recently-updated job with the given business key whose
    /// status is non-terminal, if any.
    async fn find_latest_non_terminal(&self, key: &JobKey)
        -> Result<Option<Job>, RegistryError>;

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>, RegistryError>;

    /// Resolve jobs by id; ids with no matching job are simply absent from
    /// the result.
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Job>, RegistryError>;

    /// Atomic batch upsert of one reconcile pass's touched jobs.
    async fn save_all(&self, jobs: &[Job]) -> Result<(), RegistryError>;
}
