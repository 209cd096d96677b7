//! Coordinator configuration from environment variables.

use anyhow::{Context, Result};

use mata_bus::{DEFAULT_ACK_TOPIC, DEFAULT_SPEC_TOPIC};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub database_url: String,
    pub nats_url: String,
    pub metrics_port: u16,
    // Tick intervals
    pub poll_interval_secs: u64,
    pub spec_sync_interval_secs: u64,
    // Per-pass runner-call budget
    pub job_update_timeout_secs: u64,
    // Bus topics
    pub spec_topic: String,
    pub ack_topic: String,
}

impl CoordinatorConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL required")?,
            nats_url: std::env::var("NATS_URL").context("NATS_URL required")?,
            metrics_port: std::env::var("METRICS_PORT")
                .unwrap_or_else(|_| "9090".to_string())
                .parse()
                .context("Invalid METRICS_PORT")?,
            poll_interval_secs: std::env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid POLL_INTERVAL_SECS")?,
            spec_sync_interval_secs: std::env::var("SPEC_SYNC_INTERVAL_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid SPEC_SYNC_INTERVAL_SECS")?,
            job_update_timeout_secs: std::env::var("JOB_UPDATE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid JOB_UPDATE_TIMEOUT_SECS")?,
            spec_topic: std::env::var("SPEC_TOPIC")
                .unwrap_or_else(|_| DEFAULT_SPEC_TOPIC.to_string()),
            ack_topic: std::env::var("ACK_TOPIC")
                .unwrap_or_else(|_| DEFAULT_ACK_TOPIC.to_string()),
        })
    }
}
