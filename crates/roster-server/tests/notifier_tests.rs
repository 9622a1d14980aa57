//! Notifier stage and queue worker against in-memory backends

mod common;

use common::{Harness, LINK_BUCKET, SENDER, UPLOAD_BUCKET};
use roster_common::Member;
use roster_server::config::DEFAULT_MAIL_SUBJECT;
use roster_server::error::SyncError;
use roster_server::pipeline::ObjectRef;
use roster_server::queue::NotificationQueue;
use roster_server::worker::NotificationWorker;
use std::sync::atomic::Ordering;

fn seed(harness: &Harness, emails: &[&str]) {
    for email in emails {
        harness.members.insert(Member::new(*email, None));
    }
}

fn worker(harness: &Harness) -> NotificationWorker {
    NotificationWorker::new(
        harness.queue.clone(),
        harness.pipeline.notifier.clone(),
        &harness.config.queue,
    )
}

#[tokio::test]
async fn test_notify_sends_link_and_sets_flag() {
    let harness = Harness::new();
    seed(&harness, &["alice@example.com"]);

    harness.pipeline.notifier.notify("alice@example.com").await.unwrap();

    let sent = harness.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "alice@example.com");
    assert_eq!(sent[0].from, SENDER);
    assert_eq!(sent[0].subject, DEFAULT_MAIL_SUBJECT);
    assert_eq!(
        sent[0].body,
        format!("https://signed.example/{}/index.html?expires=7200", LINK_BUCKET)
    );

    assert!(harness.members.get("alice@example.com").unwrap().notified);
}

#[tokio::test]
async fn test_mail_failure_leaves_flag_unset() {
    let harness = Harness::new();
    seed(&harness, &["alice@example.com"]);
    harness.mailer.fail_for("alice@example.com");

    let err = harness.pipeline.notifier.notify("alice@example.com").await.unwrap_err();

    assert!(matches!(err, SyncError::Backend(_)));
    assert!(!harness.members.get("alice@example.com").unwrap().notified);
}

#[tokio::test]
async fn test_link_failure_sends_nothing() {
    let harness = Harness::new();
    seed(&harness, &["alice@example.com"]);
    harness.objects.fail_presign.store(true, Ordering::SeqCst);

    assert!(harness.pipeline.notifier.notify("alice@example.com").await.is_err());
    assert!(harness.mailer.sent().is_empty());
    assert!(!harness.members.get("alice@example.com").unwrap().notified);
}

#[tokio::test]
async fn test_unknown_member_fails_after_email_without_creating_record() {
    let harness = Harness::new();

    let err = harness.pipeline.notifier.notify("ghost@example.com").await.unwrap_err();

    assert!(matches!(err, SyncError::ConditionFailed(ref email) if email == "ghost@example.com"));
    assert_eq!(harness.mailer.sent().len(), 1);
    assert_eq!(harness.members.len(), 0);
}

#[tokio::test]
async fn test_batch_continues_past_failed_task() {
    let harness = Harness::new();
    seed(&harness, &["a@example.com", "b@example.com", "c@example.com"]);
    harness.mailer.fail_for("b@example.com");
    for email in ["a@example.com", "b@example.com", "c@example.com"] {
        harness.queue.publish(email).await.unwrap();
    }
    let deliveries = harness.queue.receive(10).await.unwrap();

    let results = harness.pipeline.notifier.process_batch(&deliveries).await;

    let outcomes: Vec<bool> = results.iter().map(|(_, r)| r.is_ok()).collect();
    assert_eq!(outcomes, vec![true, false, true]);
    assert!(harness.members.get("a@example.com").unwrap().notified);
    assert!(!harness.members.get("b@example.com").unwrap().notified);
    assert!(harness.members.get("c@example.com").unwrap().notified);
}

#[tokio::test]
async fn test_upload_to_notified_happy_path() {
    let harness = Harness::new();
    harness.objects.put(
        UPLOAD_BUCKET,
        "roster.csv",
        b"email,name\nalice@example.com,Alice\nbob@example.com,Bob\n",
    );
    harness
        .pipeline
        .ingestor
        .ingest_object(&ObjectRef::new(UPLOAD_BUCKET, "roster.csv"))
        .await
        .unwrap();

    let summary = worker(&harness).run_once().await.unwrap();

    assert_eq!(summary.received, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(harness.mailer.sent().len(), 2);
    assert!(harness.members.all().iter().all(|m| m.notified));
    assert_eq!(harness.queue.len(), 0);
}

#[tokio::test]
async fn test_worker_leaves_failed_task_for_redelivery() {
    let harness = Harness::new();
    seed(&harness, &["alice@example.com", "bob@example.com"]);
    harness.mailer.fail_for("bob@example.com");
    harness.queue.publish("alice@example.com").await.unwrap();
    harness.queue.publish("bob@example.com").await.unwrap();
    let worker = worker(&harness);

    let first = worker.run_once().await.unwrap();
    assert_eq!((first.succeeded, first.failed), (1, 1));
    assert_eq!(harness.queue.bodies(), vec!["bob@example.com".to_string()]);

    // Still in flight until the visibility timeout passes
    assert_eq!(worker.run_once().await.unwrap().received, 0);

    harness.mailer.recover();
    harness.queue.expire_visibility();
    let second = worker.run_once().await.unwrap();
    assert_eq!((second.received, second.succeeded), (1, 1));
    assert_eq!(harness.queue.len(), 0);
    assert!(harness.members.get("bob@example.com").unwrap().notified);
}

#[tokio::test]
async fn test_worker_discards_task_past_max_receives() {
    let harness = Harness::new();
    seed(&harness, &["bob@example.com"]);
    harness.mailer.fail_for("bob@example.com");
    harness.queue.publish("bob@example.com").await.unwrap();
    let worker = worker(&harness);
    let max_receives = harness.config.queue.max_receives;

    for _ in 0..max_receives {
        let summary = worker.run_once().await.unwrap();
        assert_eq!(summary.failed, 1);
        harness.queue.expire_visibility();
    }

    let last = worker.run_once().await.unwrap();
    assert_eq!(last.discarded, 1);
    assert_eq!(last.failed, 0);
    assert_eq!(harness.queue.len(), 0);
    assert_eq!(harness.mailer.sent().len(), 0);
}

#[tokio::test]
async fn test_worker_drops_task_with_blank_body() {
    let harness = Harness::new();
    harness.queue.publish("   ").await.unwrap();
    let worker = worker(&harness);

    let summary = worker.run_once().await.unwrap();

    assert_eq!((summary.rejected, summary.failed), (1, 0));
    assert_eq!(harness.queue.len(), 0);
    assert!(harness.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_worker_emails_unknown_member_once_and_drops_task() {
    let harness = Harness::new();
    harness.queue.publish("ghost@example.com").await.unwrap();
    let worker = worker(&harness);

    for _ in 0..=harness.config.queue.max_receives {
        worker.run_once().await.unwrap();
        harness.queue.expire_visibility();
    }

    assert_eq!(harness.queue.len(), 0);
    let to_ghost = harness
        .mailer
        .sent()
        .iter()
        .filter(|email| email.to == "ghost@example.com")
        .count();
    assert_eq!(to_ghost, 1);
    assert_eq!(harness.members.len(), 0);
}
