//! Ack channel — consumes per-job delivery acknowledgements.

use async_nats::jetstream::{self, consumer::PullConsumer, stream::Stream as JsStream};
use serde::{Deserialize, Serialize};

use crate::BusError;

pub const ACK_STREAM: &str = "MATA_ACKS";
pub const DEFAULT_ACK_TOPIC: &str = "mata.acks";
const ACK_CONSUMER: &str = "mata-coordinator";

/// Acknowledgement published by an ingestion job after applying a spec.
/// The payload is untrusted; the listener validates every field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckMessage {
    /// `project/name` reference of the acknowledged feature set.
    pub feature_set_reference: String,
    pub feature_set_version: i32,
    /// Coordinator job id the acknowledging job was started under.
    pub job_name: String,
}

/// Pull-consumer handle on the ack stream.
pub struct AckChannel {
    stream: tokio::sync::Mutex<JsStream>,
}

impl AckChannel {
    /// Connect to NATS and ensure the ack stream exists. `topic` is the
    /// subject ingestion jobs publish acknowledgements on.
    pub async fn connect(nats_url: &str, topic: &str) -> Result<Self, BusError> {
        let client = async_nats::connect(nats_url)
            .await
            .map_err(|e| BusError::ConnectFailed(e.to_string()))?;
        let jetstream = jetstream::new(client);

        let stream = jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: ACK_STREAM.to_string(),
                subjects: vec![topic.to_string()],
                retention: jetstream::stream::RetentionPolicy::WorkQueue,
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::ConnectFailed(e.to_string()))?;

        Ok(AckChannel {
            stream: tokio::sync::Mutex::new(stream),
        })
    }

    /// Create the durable pull consumer the coordinator drains.
    pub async fn consumer(&self) -> Result<PullConsumer, BusError> {
        let stream = self.stream.lock().await;
        stream
            .get_or_create_consumer(
                ACK_CONSUMER,
                jetstream::consumer::pull::Config {
                    durable_name: Some(ACK_CONSUMER.to_string()),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| BusError::ConsumeFailed(e.to_string()))
    }

    /// Current pending message count for the ack stream.
    pub async fn depth(&self) -> Result<u64, BusError> {
        let mut stream = self.stream.lock().await;
        let info = stream
            .info()
            .await
            .map_err(|e| BusError::ConsumeFailed(e.to_string()))?;
        Ok(info.state.messages)
    }
}
