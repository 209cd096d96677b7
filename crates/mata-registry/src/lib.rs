//! Mata Registry - repository contracts and the Postgres implementation
//!
//! The coordinator depends only on the query traits in [`repository`];
//! [`postgres`] implements them over sqlx, and [`spec_service`] exposes
//! the store/feature-set listing surface the reconciler expands
//! subscriptions through.

pub mod error;
pub mod postgres;
pub mod repository;
pub mod spec_service;

pub use error::RegistryError;
pub use postgres::PgRegistry;
pub use repository::{FeatureSetRepository, JobRepository, SourceRepository, StoreRepository};
pub use spec_service::{FeatureSetFilter, RegistrySpecService, SpecService, StoreFilter};
