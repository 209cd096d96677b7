//! matad binary — coordinator daemon for the mata platform.
//!
//! Three independent drivers run concurrently: the reconcile loop, the
//! spec-propagation loop and the ack consumer. Each is serialized with
//! itself and absorbs transient failures; only startup errors are fatal.

mod config;
mod health;
mod metrics;

use anyhow::Result;
use futures::StreamExt;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use mata_bus::{AckChannel, AckMessage, NatsSpecChannel};
use mata_coordinator::{AckListener, AckOutcome, AckRecord, JobCoordinator, SpecPropagator};
use mata_model::{FeatureSetStatus, JobStatus};
use mata_registry::{PgRegistry, RegistrySpecService};
use mata_runner::queue::QueueRunner;

use config::CoordinatorConfig;
use health::HealthState;
use metrics::CoordinatorMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = CoordinatorConfig::from_env()?;
    info!("Starting matad");

    // Connect to Postgres
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    info!("Connected to database");

    let registry = Arc::new(PgRegistry::new(pool));

    // Connect to NATS: runner queue, spec channel, ack channel
    let runner = Arc::new(QueueRunner::connect(&config.nats_url).await?);
    let spec_channel =
        Arc::new(NatsSpecChannel::connect(&config.nats_url, &config.spec_topic).await?);
    let ack_channel = AckChannel::connect(&config.nats_url, &config.ack_topic).await?;
    info!("Connected to NATS at {}", config.nats_url);

    // Metrics and health/readiness state
    let coordinator_metrics = CoordinatorMetrics::new();
    let ready = Arc::new(std::sync::atomic::AtomicBool::new(true));
    let health_state = Arc::new(HealthState {
        metrics: coordinator_metrics.clone(),
        ready: ready.clone(),
    });

    let metrics_port = config.metrics_port;
    let health_router = health::health_router(health_state);
    tokio::spawn(async move {
        let addr = format!("0.0.0.0:{}", metrics_port);
        info!("Metrics server listening on {}", addr);
        let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
        axum::serve(listener, health_router).await.unwrap();
    });

    // Coordinator processes
    let spec_service = Arc::new(RegistrySpecService::new(registry.clone(), registry.clone()));
    let coordinator = Arc::new(JobCoordinator::new(
        spec_service,
        registry.clone(),
        registry.clone(),
        registry.clone(),
        runner,
        Duration::from_secs(config.job_update_timeout_secs),
    ));
    let propagator = Arc::new(SpecPropagator::new(
        registry.clone(),
        registry.clone(),
        spec_channel,
    ));
    let listener = AckListener::new(registry.clone(), registry.clone());

    spawn_poll_loop(
        coordinator,
        registry.clone(),
        coordinator_metrics.clone(),
        config.poll_interval_secs,
    );
    info!("Reconcile loop started (interval: {}s)", config.poll_interval_secs);

    spawn_propagation_loop(
        propagator,
        registry.clone(),
        coordinator_metrics.clone(),
        config.spec_sync_interval_secs,
    );
    info!(
        "Spec propagation loop started (interval: {}s)",
        config.spec_sync_interval_secs
    );

    // Drain the ack channel on the main task (blocks forever)
    run_ack_loop(ack_channel, listener, coordinator_metrics).await
}

fn spawn_poll_loop(
    coordinator: Arc<JobCoordinator>,
    registry: Arc<PgRegistry>,
    metrics: CoordinatorMetrics,
    interval_secs: u64,
) {
    use mata_registry::JobRepository;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            match coordinator.poll().await {
                Ok(summary) => {
                    metrics.jobs_started.inc_by(summary.started as u64);
                    metrics.jobs_aborted.inc_by(summary.aborted as u64);
                }
                Err(e) => {
                    warn!("Reconcile pass failed: {}", e);
                    metrics.poll_failures.inc();
                }
            }
            if let Ok(running) = registry.find_by_status(JobStatus::Running).await {
                metrics.running_jobs.set(running.len() as i64);
            }
        }
    });
}

fn spawn_propagation_loop(
    propagator: Arc<SpecPropagator>,
    registry: Arc<PgRegistry>,
    metrics: CoordinatorMetrics,
    interval_secs: u64,
) {
    use mata_registry::FeatureSetRepository;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            match propagator.publish_pending().await {
                Ok(summary) => {
                    metrics.specs_published.inc_by(summary.published as u64);
                    metrics
                        .spec_publish_failures
                        .inc_by(summary.failed as u64);
                }
                Err(e) => warn!("Spec propagation tick failed: {}", e),
            }
            if let Ok(pending) = registry.find_by_status(FeatureSetStatus::Pending).await {
                metrics.pending_feature_sets.set(pending.len() as i64);
            }
        }
    });
}

/// Pull acks from the bus and fold them into feature-set state.
async fn run_ack_loop(
    ack_channel: AckChannel,
    listener: AckListener,
    metrics: CoordinatorMetrics,
) -> Result<()> {
    let consumer = ack_channel.consumer().await?;
    let mut messages = consumer.messages().await?;

    info!("Ack loop started");

    loop {
        if let Ok(depth) = ack_channel.depth().await {
            metrics.ack_queue_depth.set(depth as i64);
        }

        match messages.next().await {
            Some(Ok(msg)) => {
                let payload: Result<AckMessage, _> = serde_json::from_slice(&msg.payload);
                match payload {
                    Ok(ack) => match listener.process(&AckRecord::from(ack)).await {
                        Ok(AckOutcome::Discarded(reason)) => {
                            debug!("Discarded ack: {:?}", reason);
                            metrics.acks_discarded.inc();
                        }
                        Ok(_) => {
                            metrics.acks_applied.inc();
                        }
                        Err(e) => {
                            // Left unacked so the broker redelivers it
                            // once the registry is reachable again.
                            warn!("Ack processing failed: {}", e);
                            continue;
                        }
                    },
                    Err(e) => {
                        warn!("Invalid ack message: {}", e);
                        metrics.acks_discarded.inc();
                    }
                }
                msg.ack().await.ok();
            }
            Some(Err(e)) => warn!("Ack consumer error: {}", e),
            None => break,
        }
    }

    Ok(())
}
