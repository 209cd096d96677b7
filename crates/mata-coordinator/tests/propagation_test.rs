//! Integration tests for spec propagation, ack handling and feature-set
//! promotion.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use uuid::Uuid;

use mata_coordinator::{AckListener, AckOutcome, AckRecord, DiscardReason, SpecPropagator};
use mata_model::{DeliveryStatus, FeatureSetStatus, FieldSpec, JobStatus, ValueType};

use common::{feature_set, kafka_source, running_job, InMemoryRegistry, RecordingPublisher};

fn propagator(
    registry: &Arc<InMemoryRegistry>,
    publisher: &Arc<RecordingPublisher>,
) -> SpecPropagator {
    SpecPropagator::new(registry.clone(), registry.clone(), publisher.clone())
}

fn listener(registry: &Arc<InMemoryRegistry>) -> AckListener {
    AckListener::new(registry.clone(), registry.clone())
}

fn ack(key: &str, version: i32, job_name: &str) -> AckRecord {
    AckRecord {
        key: key.to_string(),
        feature_set_version: version,
        job_name: job_name.to_string(),
    }
}

/// Feature set at version 2 with two running jobs still on version 1 and
/// one aborted job already at version 2.
fn seed_pending_feature_set(registry: &InMemoryRegistry) -> (Uuid, Uuid, Uuid) {
    let source = registry.add_source(kafka_source("clickstream"));
    let mut fs = feature_set("project1", "fs_1", source.clone());
    fs.version = 2;
    fs.entities = vec![FieldSpec::new("user_id", ValueType::Int64)];
    fs.features = vec![FieldSpec::new("rating", ValueType::Double)];
    let reference = fs.reference();

    let job1 = running_job(source.clone(), "online", &[reference.clone()], 30);
    let job2 = running_job(source.clone(), "historical", &[reference.clone()], 20);
    let mut job3 = running_job(source.clone(), "archive", &[reference.clone()], 10);
    job3.status = JobStatus::Aborted;

    for (job, version) in [(&job1, 1), (&job2, 1), (&job3, 2)] {
        fs.attach_job(job.id);
        let link = fs.job_status_mut(job.id).unwrap();
        link.version = version;
        link.delivery_status = DeliveryStatus::Delivered;
    }

    let ids = (job1.id, job2.id, job3.id);
    registry.add_job(job1);
    registry.add_job(job2);
    registry.add_job(job3);
    registry.add_feature_set(fs);
    ids
}

#[tokio::test]
async fn publishes_once_and_resets_links_of_live_jobs() {
    let registry = Arc::new(InMemoryRegistry::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let (job1, job2, job3) = seed_pending_feature_set(&registry);

    let summary = propagator(&registry, &publisher)
        .publish_pending()
        .await
        .unwrap();

    assert_eq!(summary.published, 1);
    assert_eq!(publisher.publish_calls(), 1);
    let published = publisher.published.lock().unwrap();
    assert_eq!(published[0].0, "project1/fs_1");
    assert_eq!(published[0].1.version, 2);
    assert_eq!(published[0].1.entities.len(), 1);
    assert_eq!(published[0].1.features.len(), 1);
    drop(published);

    let fs = registry.feature_set("project1", "fs_1").unwrap();
    for id in [job1, job2] {
        let link = fs.job_status(id).unwrap();
        assert_eq!(link.version, 2);
        assert_eq!(link.delivery_status, DeliveryStatus::InProgress);
    }
    // The aborted job's link is never touched.
    let link = fs.job_status(job3).unwrap();
    assert_eq!(link.version, 2);
    assert_eq!(link.delivery_status, DeliveryStatus::Delivered);
}

#[tokio::test]
async fn acks_from_every_live_job_promote_the_feature_set() {
    let registry = Arc::new(InMemoryRegistry::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let (job1, job2, _) = seed_pending_feature_set(&registry);

    propagator(&registry, &publisher)
        .publish_pending()
        .await
        .unwrap();
    let listener = listener(&registry);

    let outcome = listener
        .process(&ack("project1/fs_1", 2, &job1.to_string()))
        .await
        .unwrap();
    assert_eq!(outcome, AckOutcome::Applied);
    assert_eq!(
        registry.feature_set("project1", "fs_1").unwrap().status,
        FeatureSetStatus::Pending
    );

    let outcome = listener
        .process(&ack("project1/fs_1", 2, &job2.to_string()))
        .await
        .unwrap();
    assert_eq!(outcome, AckOutcome::Promoted);
    assert_eq!(
        registry.feature_set("project1", "fs_1").unwrap().status,
        FeatureSetStatus::Ready
    );
}

#[tokio::test]
async fn failed_publish_leaves_links_untouched() {
    let registry = Arc::new(InMemoryRegistry::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let (job1, job2, _) = seed_pending_feature_set(&registry);
    publisher.fail_publishes.store(true, Ordering::SeqCst);

    let summary = propagator(&registry, &publisher)
        .publish_pending()
        .await
        .unwrap();

    assert_eq!(summary.published, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(registry.feature_sets_saved.load(Ordering::SeqCst), 0);

    let fs = registry.feature_set("project1", "fs_1").unwrap();
    for id in [job1, job2] {
        assert_eq!(fs.job_status(id).unwrap().version, 1);
    }
}

#[tokio::test]
async fn pending_feature_set_without_live_jobs_is_not_published() {
    let registry = Arc::new(InMemoryRegistry::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let source = registry.add_source(kafka_source("clickstream"));

    // No links at all.
    registry.add_feature_set(feature_set("project1", "orphan", source.clone()));

    // Only link points at an aborted job.
    let mut fs = feature_set("project1", "retired", source.clone());
    let mut job = running_job(source, "online", &[fs.reference()], 10);
    job.status = JobStatus::Aborted;
    fs.attach_job(job.id);
    registry.add_job(job);
    registry.add_feature_set(fs);

    let summary = propagator(&registry, &publisher)
        .publish_pending()
        .await
        .unwrap();

    assert_eq!(summary.up_to_date, 2);
    assert_eq!(publisher.publish_calls(), 0);
    for name in ["orphan", "retired"] {
        assert_eq!(
            registry.feature_set("project1", name).unwrap().status,
            FeatureSetStatus::Pending
        );
    }
}

#[tokio::test]
async fn invalid_and_stale_acks_are_discarded_without_mutation() {
    let registry = Arc::new(InMemoryRegistry::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let (job1, _, _) = seed_pending_feature_set(&registry);
    propagator(&registry, &publisher)
        .publish_pending()
        .await
        .unwrap();
    let saves_after_publish = registry.feature_sets_saved.load(Ordering::SeqCst);
    let listener = listener(&registry);

    let cases = [
        (
            ack("not-a-reference", 2, &job1.to_string()),
            DiscardReason::MalformedKey,
        ),
        (
            ack("project1/unknown", 2, &job1.to_string()),
            DiscardReason::UnknownFeatureSet,
        ),
        (ack("project1/fs_1", 2, ""), DiscardReason::EmptyJobName),
        (
            ack("project1/fs_1", -1, &job1.to_string()),
            DiscardReason::NegativeVersion,
        ),
        (
            ack("project1/fs_1", 2, &Uuid::new_v4().to_string()),
            DiscardReason::UnknownJob,
        ),
        (
            ack("project1/fs_1", 2, "not-a-job-id"),
            DiscardReason::UnknownJob,
        ),
        (
            ack("project1/fs_1", 1, &job1.to_string()),
            DiscardReason::StaleVersion,
        ),
    ];

    for (record, reason) in cases {
        let outcome = listener.process(&record).await.unwrap();
        assert_eq!(outcome, AckOutcome::Discarded(reason), "{:?}", record);
    }

    // Nothing was written and no delivery state moved.
    assert_eq!(
        registry.feature_sets_saved.load(Ordering::SeqCst),
        saves_after_publish
    );
    let fs = registry.feature_set("project1", "fs_1").unwrap();
    assert_eq!(fs.status, FeatureSetStatus::Pending);
    assert_eq!(
        fs.job_status(job1).unwrap().delivery_status,
        DeliveryStatus::InProgress
    );
}
