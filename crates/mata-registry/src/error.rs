//! Typed errors for the registry crate.

use std::fmt;

/// Errors that can occur talking to the backing store.
#[derive(Debug)]
pub enum RegistryError {
    /// Failed to reach the database.
    ConnectionFailed(String),
    /// A query failed to execute.
    QueryFailed(String),
    /// A row could not be decoded into its model type.
    DecodeFailed(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::ConnectionFailed(msg) => write!(f, "connection failed: {}", msg),
            RegistryError::QueryFailed(msg) => write!(f, "query failed: {}", msg),
            RegistryError::DecodeFailed(msg) => write!(f, "row decode failed: {}", msg),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<sqlx::Error> for RegistryError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                RegistryError::ConnectionFailed(e.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                RegistryError::DecodeFailed(e.to_string())
            }
            other => RegistryError::QueryFailed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        RegistryError::DecodeFailed(e.to_string())
    }
}
