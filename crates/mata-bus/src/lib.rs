//! Mata Bus - message-bus adapters
//!
//! Two channels: the spec channel carries feature-set specs to running
//! ingestion jobs (publish direction, keyed by feature-set reference),
//! and the ack channel carries per-job delivery acknowledgements back
//! (consume direction).

pub mod ack;
pub mod spec;

use std::fmt;

pub use ack::{AckChannel, AckMessage, ACK_STREAM, DEFAULT_ACK_TOPIC};
pub use spec::{NatsSpecChannel, SpecPublisher, DEFAULT_SPEC_TOPIC, SPEC_STREAM};

/// Errors that can occur on the message bus.
#[derive(Debug)]
pub enum BusError {
    /// Failed to reach the broker.
    ConnectFailed(String),
    /// The broker did not acknowledge a publish (including timeouts and
    /// cancellations).
    PublishFailed(String),
    /// Consuming from a stream failed.
    ConsumeFailed(String),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::ConnectFailed(msg) => write!(f, "connect failed: {}", msg),
            BusError::PublishFailed(msg) => write!(f, "publish failed: {}", msg),
            BusError::ConsumeFailed(msg) => write!(f, "consume failed: {}", msg),
        }
    }
}

impl std::error::Error for BusError {}
