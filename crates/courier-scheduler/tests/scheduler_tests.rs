// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scheduler tests: memory store, session registry and mock
//! transports wired through the test harness.

use std::sync::Arc;
use std::time::Duration;

use courier_config::SchedulerConfig;
use courier_core::{
    CourierError, JobContent, JobId, JobStatus, PayloadKind, SessionState, TenantId,
};
use courier_scheduler::{JobRequest, Scheduler, TickReport};
use courier_test_utils::observer::{self, wait_for_state};
use courier_test_utils::{FlakyStore, MockBehavior, TestHarness};

const PAST: &str = "2020-01-01T08:00";
const FUTURE: &str = "2099-01-01T08:00";

fn tenant(id: &str) -> TenantId {
    TenantId::from(id)
}

fn text_job(due_at: &str) -> JobRequest {
    JobRequest {
        recipient: "6281234567890".into(),
        payload_kind: PayloadKind::Text,
        content: JobContent::text("good morning"),
        due_at: due_at.into(),
    }
}

fn temp_image_job(media: &str, due_at: &str) -> JobRequest {
    JobRequest {
        recipient: "6281234567890".into(),
        payload_kind: PayloadKind::Image,
        content: JobContent::media(media, Some("promo".into())).temporary(),
        due_at: due_at.into(),
    }
}

/// A scheduler over `store`, dispatching through the harness's sessions.
fn scheduler_over(harness: &TestHarness, store: Arc<FlakyStore>) -> Scheduler {
    Scheduler::new(
        store,
        Arc::new(harness.registry.clone()),
        harness.releaser.clone(),
        &SchedulerConfig::default(),
    )
    .unwrap()
}

/// Connect `tenant` with a transport that behaves like `behavior` once up.
async fn connect_with(harness: &TestHarness, tenant_id: &str, behavior: MockBehavior) {
    harness.factory.set_behavior_for(tenant_id, behavior);
    let (tx, mut rx) = observer::observer();
    harness.registry.acquire(&tenant(tenant_id), tx).await;
    assert!(wait_for_state(&mut rx, SessionState::Connected).await);
}

#[tokio::test]
async fn due_job_is_sent_through_the_connected_session() {
    let harness = TestHarness::builder().build();
    let (_handle, _rx) = harness.connect("u1").await;

    let job = harness
        .scheduler
        .schedule(&tenant("u1"), text_job(PAST))
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);

    let report = harness.scheduler.tick().await;
    assert_eq!(
        report,
        TickReport {
            due: 1,
            sent: 1,
            ..TickReport::default()
        }
    );

    let jobs = harness.scheduler.list(&tenant("u1")).await.unwrap();
    assert_eq!(jobs[0].status, JobStatus::Sent);
    let executed_at = jobs[0].executed_at.expect("sent job has executed_at");
    assert!(executed_at >= jobs[0].created_at);
    assert!(jobs[0].error.is_none());

    let sent = harness.factory.latest("u1").unwrap().sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "6281234567890");
    assert_eq!(sent[0].content.text.as_deref(), Some("good morning"));

    // Already sent; nothing left to do.
    assert_eq!(harness.scheduler.tick().await.due, 0);
}

#[tokio::test]
async fn job_without_a_session_fails_and_is_not_retried() {
    let harness = TestHarness::builder().build();
    harness
        .scheduler
        .schedule(&tenant("offline"), text_job(PAST))
        .await
        .unwrap();

    let report = harness.scheduler.tick().await;
    assert_eq!(report.failed, 1);

    let jobs = harness.scheduler.list(&tenant("offline")).await.unwrap();
    assert_eq!(jobs[0].status, JobStatus::Failed);
    assert!(jobs[0].error.as_deref().unwrap().contains("not connected"));
    assert!(jobs[0].executed_at.is_none());

    assert_eq!(harness.scheduler.tick().await.due, 0);
}

#[tokio::test]
async fn future_jobs_wait() {
    let harness = TestHarness::builder().build();
    let (_handle, _rx) = harness.connect("u1").await;
    harness
        .scheduler
        .schedule(&tenant("u1"), text_job(FUTURE))
        .await
        .unwrap();

    assert_eq!(harness.scheduler.tick().await, TickReport::default());
    assert_eq!(harness.factory.latest("u1").unwrap().sent_count(), 0);
}

#[tokio::test]
async fn overlapping_ticks_never_dispatch_twice() {
    let harness = TestHarness::builder().build();
    connect_with(
        &harness,
        "u1",
        MockBehavior::connects_as("u1@c.us").with_send_delay(Duration::from_millis(200)),
    )
    .await;
    harness
        .scheduler
        .schedule(&tenant("u1"), text_job(PAST))
        .await
        .unwrap();

    let (a, b) = tokio::join!(harness.scheduler.tick(), harness.scheduler.tick());

    assert!(a.skipped ^ b.skipped);
    assert_eq!(a.sent + b.sent, 1);
    assert_eq!(harness.factory.latest("u1").unwrap().sent_count(), 1);
}

#[tokio::test]
async fn jobs_of_one_tenant_go_out_in_order() {
    let harness = TestHarness::builder().build();
    let (_handle, _rx) = harness.connect("u1").await;
    for text in ["first", "second", "third"] {
        let request = JobRequest {
            content: JobContent::text(text),
            ..text_job(PAST)
        };
        harness.scheduler.schedule(&tenant("u1"), request).await.unwrap();
    }

    assert_eq!(harness.scheduler.tick().await.sent, 3);
    let texts: Vec<_> = harness
        .factory
        .latest("u1")
        .unwrap()
        .sent_messages()
        .into_iter()
        .filter_map(|m| m.content.text)
        .collect();
    assert_eq!(texts, ["first", "second", "third"]);
}

#[tokio::test]
async fn one_failure_does_not_stop_other_tenants() {
    let harness = TestHarness::builder().build();
    let (_handle, _rx) = harness.connect("u1").await;
    connect_with(
        &harness,
        "u2",
        MockBehavior::connects_as("u2@c.us").failing_sends("number not registered"),
    )
    .await;

    harness.scheduler.schedule(&tenant("u1"), text_job(PAST)).await.unwrap();
    harness.scheduler.schedule(&tenant("u2"), text_job(PAST)).await.unwrap();

    let report = harness.scheduler.tick().await;
    assert_eq!((report.due, report.sent, report.failed), (2, 1, 1));

    let failed = harness.scheduler.list(&tenant("u2")).await.unwrap();
    assert!(failed[0].error.as_deref().unwrap().contains("number not registered"));
}

#[tokio::test]
async fn temporary_media_is_released_once_after_sending() {
    let harness = TestHarness::builder().build();
    let (_handle, _rx) = harness.connect("u1").await;
    harness
        .scheduler
        .schedule(&tenant("u1"), temp_image_job("/srv/media/a.jpg", PAST))
        .await
        .unwrap();

    assert_eq!(harness.scheduler.tick().await.sent, 1);
    harness.scheduler.tick().await;
    assert_eq!(harness.releaser.count("/srv/media/a.jpg"), 1);
}

#[tokio::test]
async fn temporary_media_is_released_once_after_failing() {
    let harness = TestHarness::builder().build();
    harness
        .scheduler
        .schedule(&tenant("offline"), temp_image_job("/srv/media/b.jpg", PAST))
        .await
        .unwrap();

    assert_eq!(harness.scheduler.tick().await.failed, 1);
    harness.scheduler.tick().await;
    assert_eq!(harness.releaser.count("/srv/media/b.jpg"), 1);
}

#[tokio::test]
async fn release_failure_does_not_change_the_outcome() {
    let harness = TestHarness::builder().build();
    let (_handle, _rx) = harness.connect("u1").await;
    harness.releaser.fail_releases(true);
    harness
        .scheduler
        .schedule(&tenant("u1"), temp_image_job("/srv/media/c.jpg", PAST))
        .await
        .unwrap();

    assert_eq!(harness.scheduler.tick().await.sent, 1);
    let jobs = harness.scheduler.list(&tenant("u1")).await.unwrap();
    assert_eq!(jobs[0].status, JobStatus::Sent);
}

#[tokio::test]
async fn cancelling_a_pending_job_releases_its_media() {
    let harness = TestHarness::builder().build();
    let job = harness
        .scheduler
        .schedule(&tenant("u1"), temp_image_job("/srv/media/d.jpg", FUTURE))
        .await
        .unwrap();

    assert!(harness.scheduler.cancel(&tenant("u1"), &job.id).await.unwrap());
    assert!(!harness.scheduler.cancel(&tenant("u1"), &job.id).await.unwrap());
    assert_eq!(harness.releaser.count("/srv/media/d.jpg"), 1);
    assert!(harness.scheduler.list(&tenant("u1")).await.unwrap().is_empty());
}

#[tokio::test]
async fn cancelling_a_finished_job_does_not_release_again() {
    let harness = TestHarness::builder().build();
    let (_handle, _rx) = harness.connect("u1").await;
    let job = harness
        .scheduler
        .schedule(&tenant("u1"), temp_image_job("/srv/media/e.jpg", PAST))
        .await
        .unwrap();
    harness.scheduler.tick().await;

    assert!(harness.scheduler.cancel(&tenant("u1"), &job.id).await.unwrap());
    assert_eq!(harness.releaser.count("/srv/media/e.jpg"), 1);
}

#[tokio::test]
async fn cancel_racing_a_dispatch_releases_exactly_once() {
    let harness = TestHarness::builder().build();
    connect_with(
        &harness,
        "u1",
        MockBehavior::connects_as("u1@c.us").with_send_delay(Duration::from_millis(200)),
    )
    .await;
    let job = harness
        .scheduler
        .schedule(&tenant("u1"), temp_image_job("/srv/media/f.jpg", PAST))
        .await
        .unwrap();

    let cancel = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        harness.scheduler.cancel(&tenant("u1"), &job.id).await
    };
    let (report, cancelled) = tokio::join!(harness.scheduler.tick(), cancel);

    assert_eq!(report.sent, 1);
    assert!(cancelled.unwrap());
    assert_eq!(harness.releaser.count("/srv/media/f.jpg"), 1);
}

#[tokio::test]
async fn tenants_cannot_cancel_each_others_jobs() {
    let harness = TestHarness::builder().build();
    let job = harness
        .scheduler
        .schedule(&tenant("u1"), text_job(FUTURE))
        .await
        .unwrap();

    assert!(!harness.scheduler.cancel(&tenant("u2"), &job.id).await.unwrap());
    assert_eq!(harness.scheduler.list(&tenant("u1")).await.unwrap().len(), 1);
    assert!(
        !harness
            .scheduler
            .cancel(&tenant("u1"), &JobId("missing".into()))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn listing_is_scoped_to_the_tenant() {
    let harness = TestHarness::builder().build();
    let job = harness
        .scheduler
        .schedule(&tenant("u1"), text_job(FUTURE))
        .await
        .unwrap();
    harness
        .scheduler
        .schedule(&tenant("u2"), text_job(FUTURE))
        .await
        .unwrap();

    let jobs = harness.scheduler.list(&tenant("u1")).await.unwrap();
    assert_eq!(jobs, vec![job]);
}

#[tokio::test]
async fn invalid_requests_persist_nothing() {
    let harness = TestHarness::builder().build();
    let u1 = tenant("u1");

    let blank_recipient = JobRequest {
        recipient: "  ".into(),
        ..text_job(FUTURE)
    };
    let image_without_media = JobRequest {
        payload_kind: PayloadKind::Image,
        ..text_job(FUTURE)
    };
    let bad_time = text_job("tomorrow at nine");

    for request in [blank_recipient, image_without_media, bad_time] {
        let err = harness.scheduler.schedule(&u1, request).await.unwrap_err();
        assert!(matches!(err, CourierError::Validation(_)), "got {err:?}");
    }
    assert!(harness.scheduler.list(&u1).await.unwrap().is_empty());
}

#[tokio::test]
async fn naive_times_use_the_reference_zone() {
    let harness = TestHarness::builder().with_timezone("Asia/Jakarta").build();
    let job = harness
        .scheduler
        .schedule(&tenant("u1"), text_job("2030-05-01T09:30"))
        .await
        .unwrap();
    assert_eq!(job.due_at.to_rfc3339(), "2030-05-01T09:30:00+07:00");

    let utc = TestHarness::builder().with_timezone("UTC").build();
    let job = utc
        .scheduler
        .schedule(&tenant("u1"), text_job("2030-05-01T09:30:00Z"))
        .await
        .unwrap();
    assert_eq!(job.due_at.to_rfc3339(), "2030-05-01T09:30:00+00:00");
}

#[tokio::test]
async fn slow_transport_times_out_as_a_failure() {
    let harness = TestHarness::builder().with_send_timeout_secs(1).build();
    connect_with(
        &harness,
        "u1",
        MockBehavior::connects_as("u1@c.us").with_send_delay(Duration::from_secs(5)),
    )
    .await;
    harness
        .scheduler
        .schedule(&tenant("u1"), text_job(PAST))
        .await
        .unwrap();

    assert_eq!(harness.scheduler.tick().await.failed, 1);
    let jobs = harness.scheduler.list(&tenant("u1")).await.unwrap();
    assert!(jobs[0].error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn polling_loop_dispatches_until_stopped() {
    let harness = TestHarness::builder().with_poll_interval_secs(1).build();
    let (_handle, _rx) = harness.connect("u1").await;

    assert!(harness.scheduler.start().await);
    assert!(!harness.scheduler.start().await);
    assert!(harness.scheduler.is_running().await);

    harness
        .scheduler
        .schedule(&tenant("u1"), text_job(PAST))
        .await
        .unwrap();

    let transport = harness.factory.latest("u1").unwrap();
    let mut delivered = false;
    for _ in 0..40 {
        if transport.sent_count() == 1 {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(delivered);

    harness.scheduler.stop().await;
    assert!(!harness.scheduler.is_running().await);
}

#[tokio::test]
async fn unrecorded_outcome_is_not_dispatched_again() {
    let harness = TestHarness::builder().build();
    let (_handle, _rx) = harness.connect("u1").await;
    let store = Arc::new(FlakyStore::new());
    let scheduler = scheduler_over(&harness, store.clone());
    scheduler
        .schedule(&tenant("u1"), temp_image_job("/media/promo.jpg", PAST))
        .await
        .unwrap();

    // The outcome write and its first retry both fail.
    store.fail_next_updates(2);
    assert_eq!(
        scheduler.tick().await,
        TickReport {
            due: 1,
            sent: 1,
            ..TickReport::default()
        }
    );
    let jobs = scheduler.list(&tenant("u1")).await.unwrap();
    assert_eq!(jobs[0].status, JobStatus::Pending);

    assert_eq!(scheduler.tick().await.due, 0);
    assert_eq!(scheduler.list(&tenant("u1")).await.unwrap()[0].status, JobStatus::Pending);

    assert_eq!(scheduler.tick().await.due, 0);
    let jobs = scheduler.list(&tenant("u1")).await.unwrap();
    assert_eq!(jobs[0].status, JobStatus::Sent);
    assert!(jobs[0].executed_at.is_some());

    assert_eq!(harness.factory.latest("u1").unwrap().sent_count(), 1);
    assert_eq!(harness.releaser.count("/media/promo.jpg"), 1);
    assert_eq!(store.update_attempts(), 3);
}

#[tokio::test]
async fn cancelling_an_unrecorded_job_does_not_release_again() {
    let harness = TestHarness::builder().build();
    let (_handle, _rx) = harness.connect("u1").await;
    let store = Arc::new(FlakyStore::new());
    let scheduler = scheduler_over(&harness, store.clone());
    let job = scheduler
        .schedule(&tenant("u1"), temp_image_job("/media/flyer.png", PAST))
        .await
        .unwrap();

    store.fail_next_updates(1);
    assert_eq!(scheduler.tick().await.sent, 1);
    assert_eq!(harness.releaser.count("/media/flyer.png"), 1);

    assert!(scheduler.cancel(&tenant("u1"), &job.id).await.unwrap());
    assert_eq!(harness.releaser.count("/media/flyer.png"), 1);
    assert_eq!(scheduler.tick().await, TickReport::default());
    assert_eq!(harness.factory.latest("u1").unwrap().sent_count(), 1);
}

#[tokio::test]
async fn unreadable_job_stays_pending_for_the_next_tick() {
    let harness = TestHarness::builder().build();
    let (_handle, _rx) = harness.connect("u1").await;
    let store = Arc::new(FlakyStore::new());
    let scheduler = scheduler_over(&harness, store.clone());
    scheduler
        .schedule(&tenant("u1"), text_job(PAST))
        .await
        .unwrap();

    store.fail_next_finds(1);
    assert_eq!(
        scheduler.tick().await,
        TickReport {
            due: 1,
            deferred: 1,
            ..TickReport::default()
        }
    );
    let jobs = scheduler.list(&tenant("u1")).await.unwrap();
    assert_eq!(jobs[0].status, JobStatus::Pending);
    assert!(jobs[0].error.is_none());

    assert_eq!(scheduler.tick().await.sent, 1);
    assert_eq!(harness.factory.latest("u1").unwrap().sent_count(), 1);
}

#[tokio::test]
async fn temporary_media_backs_at_most_one_pending_job() {
    let harness = TestHarness::builder().build();
    let (_handle, _rx) = harness.connect("u1").await;
    let first = harness
        .scheduler
        .schedule(&tenant("u1"), temp_image_job("/srv/media/shared.jpg", FUTURE))
        .await
        .unwrap();

    let err = harness
        .scheduler
        .schedule(&tenant("u2"), temp_image_job("/srv/media/shared.jpg", FUTURE))
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::Validation(_)));
    assert_eq!(harness.scheduler.list(&tenant("u2")).await.unwrap().len(), 0);

    // A non-temporary reference to the same file is not an owner.
    let shared = JobRequest {
        content: JobContent::media("/srv/media/shared.jpg", None),
        ..temp_image_job("/srv/media/shared.jpg", FUTURE)
    };
    harness.scheduler.schedule(&tenant("u1"), shared).await.unwrap();

    // Once the owner is gone the handle can be attached again.
    assert!(harness.scheduler.cancel(&tenant("u1"), &first.id).await.unwrap());
    harness
        .scheduler
        .schedule(&tenant("u1"), temp_image_job("/srv/media/shared.jpg", FUTURE))
        .await
        .unwrap();
}

#[tokio::test]
async fn concurrent_schedules_cannot_share_temporary_media() {
    let harness = TestHarness::builder().build();
    let scheduler = harness.scheduler.clone();

    let attempts = (0..8).map(|i| {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            scheduler
                .schedule(
                    &tenant(&format!("u{i}")),
                    temp_image_job("/srv/media/race.jpg", FUTURE),
                )
                .await
        })
    });
    let results = futures::future::join_all(attempts).await;
    let accepted = results.into_iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
    assert_eq!(accepted, 1);
}
