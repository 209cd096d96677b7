//! Spec-registry surface the reconciler expands subscriptions through.

use async_trait::async_trait;
use std::sync::Arc;

use mata_model::{wildcard_match, FeatureSet, Store, WILDCARD};

use crate::error::RegistryError;
use crate::repository::{FeatureSetRepository, StoreRepository};

/// Advisory store filter; implementations may ignore it.
#[derive(Debug, Clone, Default)]
pub struct StoreFilter {
    pub name: Option<String>,
}

/// Project/name filter with `*` wildcards.
#[derive(Debug, Clone)]
pub struct FeatureSetFilter {
    pub project: String,
    pub name: String,
}

impl FeatureSetFilter {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        FeatureSetFilter {
            project: project.into(),
            name: name.into(),
        }
    }
}

impl Default for FeatureSetFilter {
    fn default() -> Self {
        FeatureSetFilter::new(WILDCARD, WILDCARD)
    }
}

/// Listing operations of the spec registry.
#[async_trait]
pub trait SpecService: Send + Sync {
    async fn list_stores(&self, filter: &StoreFilter) -> Result<Vec<Store>, RegistryError>;

    async fn list_feature_sets(
        &self,
        filter: &FeatureSetFilter,
    ) -> Result<Vec<FeatureSet>, RegistryError>;
}

/// [`SpecService`] backed directly by the registry repositories.
pub struct RegistrySpecService {
    stores: Arc<dyn StoreRepository>,
    feature_sets: Arc<dyn FeatureSetRepository>,
}

impl RegistrySpecService {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        feature_sets: Arc<dyn FeatureSetRepository>,
    ) -> Self {
        RegistrySpecService {
            stores,
            feature_sets,
        }
    }
}

#[async_trait]
impl SpecService for RegistrySpecService {
    async fn list_stores(&self, filter: &StoreFilter) -> Result<Vec<Store>, RegistryError> {
        let mut stores = self.stores.list_stores().await?;
        if let Some(name) = &filter.name {
            stores.retain(|s| wildcard_match(name, &s.name));
        }
        Ok(stores)
    }

    async fn list_feature_sets(
        &self,
        filter: &FeatureSetFilter,
    ) -> Result<Vec<FeatureSet>, RegistryError> {
        self.feature_sets.list(&filter.project, &filter.name).await
    }
}
