//! Errors that abort a coordinator pass.

use mata_registry::RegistryError;

/// A transient failure that aborted the current pass or tick. Nothing
/// was persisted past the point of failure; the next tick re-runs the
/// whole pass.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}
