//! Spec channel — publishes feature-set specs keyed by reference.

use async_nats::jetstream;
use async_trait::async_trait;
use tracing::debug;

use mata_model::FeatureSetSpec;

use crate::BusError;

pub const SPEC_STREAM: &str = "MATA_SPECS";
pub const DEFAULT_SPEC_TOPIC: &str = "mata.specs";

/// Publish one spec under its feature-set reference key. Resolves only
/// once the broker has acknowledged the publish; consumer delivery is
/// tracked separately through the ack channel.
#[async_trait]
pub trait SpecPublisher: Send + Sync {
    async fn publish_spec(&self, key: &str, spec: &FeatureSetSpec) -> Result<(), BusError>;
}

fn subject_for(topic: &str, key: &str) -> String {
    format!("{}.{}", topic, key.replace('/', "."))
}

/// [`SpecPublisher`] over NATS JetStream. One subject per key keeps
/// publications ordered per feature-set reference.
pub struct NatsSpecChannel {
    jetstream: jetstream::Context,
    topic: String,
}

impl NatsSpecChannel {
    /// Connect to NATS and ensure the spec stream exists. `topic` is the
    /// subject prefix specs are published under.
    pub async fn connect(nats_url: &str, topic: &str) -> Result<Self, BusError> {
        let client = async_nats::connect(nats_url)
            .await
            .map_err(|e| BusError::ConnectFailed(e.to_string()))?;
        let jetstream = jetstream::new(client);

        jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: SPEC_STREAM.to_string(),
                subjects: vec![format!("{}.>", topic)],
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::ConnectFailed(e.to_string()))?;

        Ok(NatsSpecChannel {
            jetstream,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl SpecPublisher for NatsSpecChannel {
    async fn publish_spec(&self, key: &str, spec: &FeatureSetSpec) -> Result<(), BusError> {
        let payload =
            serde_json::to_vec(spec).map_err(|e| BusError::PublishFailed(e.to_string()))?;
        self.jetstream
            .publish(subject_for(&self.topic, key), payload.into())
            .await
            .map_err(|e| BusError::PublishFailed(e.to_string()))?
            .await
            .map_err(|e| BusError::PublishFailed(e.to_string()))?;

        debug!("Published spec for {} at version {}", key, spec.version);
        Ok(())
    }
}
