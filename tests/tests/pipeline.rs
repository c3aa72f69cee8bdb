//! End-to-end tests for the two-phase save.
//!
//! Sessions are recorded through `SessionPipeline` against the in-memory
//! store, with the metric provider mocked.

use habit_core::{Error, MetricKind, MetricValues};
use integration_tests::{fixtures, mocks::MockMetricSource, setup::TestContext};
use session_store::SessionStore;
use std::time::Duration;

/// Two metrics answer, one fails: the failed one is stored as 0.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_partial_failure_links_zeroed_metric() {
    let source = MockMetricSource::healthy(8500.0, 45.0, 0.0);
    source.set_failure(MetricKind::TimeInDaylight, "permission denied");
    let ctx = TestContext::with_source(source);

    let recorded = ctx
        .pipeline
        .record_session(fixtures::night(), fixtures::sleep_payload())
        .await
        .expect("Phase 1 should succeed");
    let receipt = recorded
        .enrichment
        .outcome()
        .await
        .expect("Enrichment should be scheduled")
        .expect("Enrichment should link");

    let records = ctx.store.find_habit_metrics(fixtures::night_key()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, receipt.habit_metrics_id);
    assert_eq!(records[0].values, MetricValues::new(8500.0, 45.0, 0.0));

    let sessions = ctx.sessions(fixtures::night_key()).await;
    assert_eq!(sessions[0].habit_metrics_id, Some(receipt.habit_metrics_id));
    assert_eq!(sessions[0].sleep, fixtures::sleep_payload());
}

/// Every metric fails: nothing is created and the session stays unlinked.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_all_metrics_unavailable_leaves_session_unlinked() {
    let source = MockMetricSource::new();
    source.fail_all();
    let ctx = TestContext::with_source(source);

    let recorded = ctx
        .pipeline
        .record_session(fixtures::night(), fixtures::sleep_payload())
        .await
        .expect("Phase 1 should succeed despite provider outage");
    let outcome = recorded.enrichment.outcome().await.unwrap();

    match outcome {
        Err(Error::AllMetricsUnavailable { date, errors }) => {
            assert_eq!(date, fixtures::night_key());
            assert_eq!(errors.len(), 3);
        }
        other => panic!("expected AllMetricsUnavailable, got {other:?}"),
    }

    assert_eq!(ctx.store.habit_metrics_count(), 0);
    let sessions = ctx.sessions(fixtures::night_key()).await;
    assert_eq!(sessions.len(), 1);
    assert!(!sessions[0].is_enriched());
}

/// The session disappears while metrics are in flight.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_session_deleted_before_link() {
    let ctx = TestContext::new();
    ctx.source.set_delay(MetricKind::Steps, Duration::from_millis(200));

    let recorded = ctx
        .pipeline
        .record_session(fixtures::night(), fixtures::sleep_payload())
        .await
        .unwrap();
    assert_eq!(ctx.store.delete_sessions(fixtures::night_key()), 1);

    let outcome = recorded.enrichment.outcome().await.unwrap();

    assert!(matches!(outcome, Err(Error::SessionNotFound(date)) if date == fixtures::night_key()));
    assert_eq!(ctx.store.habit_metrics_count(), 0);
}

/// Re-enriching a date overwrites its record instead of adding one.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reenrichment_overwrites_existing_record() {
    let ctx = TestContext::new();

    let recorded = ctx
        .pipeline
        .record_session(fixtures::night(), fixtures::sleep_payload())
        .await
        .unwrap();
    let first = recorded.enrichment.outcome().await.unwrap().unwrap();
    assert!(first.created);

    ctx.source.set_value(MetricKind::Steps, 9100.0);
    let second = ctx
        .pipeline
        .enrich_session(fixtures::night())
        .outcome()
        .await
        .unwrap()
        .unwrap();

    assert!(!second.created);
    assert_eq!(second.habit_metrics_id, first.habit_metrics_id);

    let records = ctx.store.find_habit_metrics(fixtures::night_key()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].values.steps, 9100.0);
}

/// A second session on the same date shares the existing record.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_session_shares_habit_metrics() {
    let ctx = TestContext::new();

    let first = ctx
        .pipeline
        .record_session(fixtures::night(), serde_json::Value::Null)
        .await
        .unwrap();
    let first = first.enrichment.outcome().await.unwrap().unwrap();

    let second = ctx
        .pipeline
        .record_session(fixtures::night(), serde_json::Value::Null)
        .await
        .unwrap();
    let second = second.enrichment.outcome().await.unwrap().unwrap();

    assert_eq!(second.habit_metrics_id, first.habit_metrics_id);
    assert_eq!(second.sessions_linked, 2);
    assert_eq!(ctx.store.habit_metrics_count(), 1);

    let sessions = ctx.sessions(fixtures::night_key()).await;
    assert!(sessions
        .iter()
        .all(|s| s.habit_metrics_id == Some(first.habit_metrics_id)));
}

/// A trigger while the date is in flight joins the running attempt, which
/// runs once more before releasing the date.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_trigger_coalesces() {
    let ctx = TestContext::new();
    ctx.source.set_delay(MetricKind::ExerciseTime, Duration::from_millis(200));

    let recorded = ctx
        .pipeline
        .record_session(fixtures::night(), serde_json::Value::Null)
        .await
        .unwrap();
    let second = ctx.pipeline.enrich_session(fixtures::night());

    assert!(recorded.enrichment.is_scheduled());
    assert!(!second.is_scheduled());

    recorded.enrichment.outcome().await.unwrap().unwrap();
    assert_eq!(ctx.source.call_count(MetricKind::Steps), 2);
    assert_eq!(ctx.store.habit_metrics_count(), 1);
}

/// A session saved while its date is being enriched still gets linked.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_session_saved_mid_enrichment_is_linked() {
    let ctx = TestContext::new();
    ctx.source.set_delay(MetricKind::Steps, Duration::from_millis(100));

    let first = ctx
        .pipeline
        .record_session(fixtures::night(), serde_json::Value::Null)
        .await
        .unwrap();
    let second = ctx
        .pipeline
        .record_session(fixtures::night(), serde_json::Value::Null)
        .await
        .unwrap();
    assert!(!second.enrichment.is_scheduled());

    let receipt = first.enrichment.outcome().await.unwrap().unwrap();

    assert_eq!(receipt.sessions_linked, 2);
    let sessions = ctx.sessions(fixtures::night_key()).await;
    assert!(sessions.iter().all(|s| s.habit_metrics_id == Some(receipt.habit_metrics_id)));
}

/// Different dates enrich independently and never share records.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dates_enrich_independently() {
    let ctx = TestContext::new();

    let mut handles = Vec::new();
    for days in 0..3 {
        let recorded = ctx
            .pipeline
            .record_session(fixtures::night_shifted(days), serde_json::Value::Null)
            .await
            .unwrap();
        assert!(recorded.enrichment.is_scheduled());
        handles.push(recorded.enrichment);
    }

    for handle in handles {
        handle.outcome().await.unwrap().unwrap();
    }

    assert_eq!(ctx.store.habit_metrics_count(), 3);
    assert_eq!(ctx.source.call_count(MetricKind::TimeInDaylight), 3);
}

/// The provider sees the session's own range.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_provider_queried_with_session_range() {
    let ctx = TestContext::new();

    let recorded = ctx
        .pipeline
        .record_session(fixtures::night(), serde_json::Value::Null)
        .await
        .unwrap();
    recorded.enrichment.outcome().await.unwrap().unwrap();

    let ranges = ctx.source.requested_ranges();
    assert_eq!(ranges.len(), 3);
    assert!(ranges.iter().all(|r| *r == fixtures::night()));
}
