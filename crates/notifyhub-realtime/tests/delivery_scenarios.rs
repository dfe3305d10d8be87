//! End-to-end delivery, queueing and replay behaviour of the manager.

mod helpers;

use std::time::Duration;

use chrono::Utc;

use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_database::NotificationStore;
use notifyhub_entity::{NotificationCategory, NotificationPriority};
use notifyhub_perf::RateLimitReason;
use notifyhub_realtime::{RejectReason, SendOutcome};

use helpers::{config, harness, message};

#[tokio::test]
async fn test_online_user_receives_directly() {
    let h = harness(config());
    h.transport.set_online("alice", true);
    let user = UserId::new("alice");

    let outcome = h.manager.send_detailed(&user, message("hello")).await;
    assert_eq!(outcome, SendOutcome::Delivered);
    assert_eq!(h.transport.titles_for("alice"), vec!["hello"]);

    let history = h.manager.get_history(&user, 10).await;
    assert_eq!(history.len(), 1);
    assert!(history[0].is_delivered());
}

#[tokio::test]
async fn test_offline_messages_replay_in_fifo_order() {
    let h = harness(config());
    let user = UserId::new("alice");
    for i in 0..4 {
        assert_eq!(
            h.manager.send_detailed(&user, message(&format!("m{i}"))).await,
            SendOutcome::Queued
        );
    }
    assert_eq!(h.manager.queue_depth(&user), 4);

    h.transport.set_online("alice", true);
    assert_eq!(h.manager.replay(&user).await, 4);
    assert_eq!(h.transport.titles_for("alice"), vec!["m0", "m1", "m2", "m3"]);
    assert_eq!(h.manager.queue_depth(&user), 0);
    assert_eq!(h.manager.stats().metrics.replayed, 4);
}

#[tokio::test]
async fn test_failed_replay_requeues_at_front() {
    let h = harness(config());
    let user = UserId::new("alice");
    for title in ["a", "b", "c"] {
        h.manager.send(&user, message(title)).await;
    }

    h.transport.set_online("alice", true);
    h.transport.set_failing(true);
    assert_eq!(h.manager.replay(&user).await, 0);
    assert_eq!(h.manager.queue_depth(&user), 3);

    h.transport.set_failing(false);
    assert_eq!(h.manager.replay(&user).await, 3);
    assert_eq!(h.transport.titles_for("alice"), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_bounded_queue_keeps_most_recent() {
    let mut cfg = config();
    cfg.notifications.max_offline_messages = 5;
    let h = harness(cfg);
    let user = UserId::new("alice");
    for i in 0..7 {
        assert!(h.manager.send(&user, message(&format!("m{i}"))).await);
        assert!(h.manager.queue_depth(&user) <= 5);
    }
    assert_eq!(h.manager.queue_depth(&user), 5);
    assert_eq!(h.manager.stats().metrics.queue_evictions, 2);

    h.transport.set_online("alice", true);
    assert_eq!(h.manager.replay(&user).await, 5);
    assert_eq!(h.transport.titles_for("alice"), vec!["m2", "m3", "m4", "m5", "m6"]);
    assert_eq!(h.manager.queue_depth(&user), 0);
}

#[tokio::test]
async fn test_rate_limit_accepts_exactly_the_role_limit() {
    let mut cfg = config();
    cfg.rate_limit.by_role.viewer = 3;
    let h = harness(cfg);
    let user = UserId::new("alice");
    for i in 0..3 {
        assert!(h.manager.send(&user, message(&format!("m{i}"))).await);
    }
    assert_eq!(
        h.manager.send_detailed(&user, message("over")).await,
        SendOutcome::Rejected(RejectReason::RateLimited(RateLimitReason::UserWindow))
    );

    let critical = message("urgent").with_priority(NotificationPriority::Critical);
    assert!(h.manager.send(&user, critical).await);
    assert_eq!(h.manager.stats().metrics.rejected_rate_limit, 1);
}

#[tokio::test]
async fn test_non_admins_never_receive_security_traffic() {
    let h = harness(config());
    h.transport.set_online("alice", true);
    h.transport.set_online("root", true);
    let security = || message("intrusion").with_id(NotificationId::generate());

    let mut msg = security();
    msg.category = NotificationCategory::Security;
    assert_eq!(
        h.manager.send_detailed(&UserId::new("alice"), msg).await,
        SendOutcome::Rejected(RejectReason::Authorization)
    );
    assert!(h.transport.titles_for("alice").is_empty());

    let audit = h.manager.router().audit().recent(10);
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].user_id.as_str(), "alice");

    let mut msg = security();
    msg.category = NotificationCategory::Security;
    assert_eq!(h.manager.send_detailed(&UserId::new("root"), msg).await, SendOutcome::Delivered);
    let frames = h.transport.frames();
    assert_eq!(frames.last().unwrap().namespace.as_str(), "admin");
}

#[tokio::test]
async fn test_unknown_users_get_viewer_permissions() {
    let h = harness(config());
    let stranger = UserId::new("stranger");
    assert!(h.manager.send(&stranger, message("welcome")).await);

    let mut admin_msg = message("audit log");
    admin_msg.category = NotificationCategory::Admin;
    assert!(!h.manager.send(&stranger, admin_msg).await);
}

#[tokio::test]
async fn test_mark_read_is_idempotent_and_scoped_to_owner() {
    let h = harness(config());
    let user = UserId::new("alice");
    let msg = message("read me");
    let id = msg.id.clone();
    h.manager.send(&user, msg).await;

    assert!(h.manager.mark_read(&id, &user).await);
    assert!(h.manager.mark_read(&id, &user).await);
    assert!(!h.manager.mark_read(&id, &UserId::new("bob")).await);
    assert!(!h.manager.mark_read(&NotificationId::new("missing"), &user).await);

    let stored = h.store.find(&id).await.unwrap().unwrap();
    assert!(stored.is_read());
    assert!(!stored.is_delivered());
    assert_eq!(h.manager.unread_count(&user).await, 0);
}

#[tokio::test]
async fn test_repeat_delivery_short_circuits_through_cache() {
    let h = harness(config());
    h.transport.set_online("alice", true);
    let user = UserId::new("alice");
    let first = message("once").with_priority(NotificationPriority::High);
    let again = first.clone();

    assert_eq!(h.manager.send_detailed(&user, first).await, SendOutcome::Delivered);
    assert_eq!(h.manager.send_detailed(&user, again).await, SendOutcome::Cached);
    assert_eq!(h.transport.titles_for("alice").len(), 1);
    assert_eq!(h.manager.stats().metrics.cached, 1);
}

#[tokio::test(start_paused = true)]
async fn test_backpressure_deflects_normal_but_admits_critical() {
    let mut cfg = config();
    cfg.rate_limit.max_global_rate = 100;
    cfg.rate_limit.global_window_seconds = 1;
    cfg.rate_limit.backpressure_threshold = 0.8;
    let h = harness(cfg);
    h.transport.set_online("root", true);
    let root = UserId::new("root");

    for i in 0..81 {
        assert!(h.manager.send(&root, message(&format!("load {i}"))).await);
    }
    assert!(h.manager.optimizer().throttler().global_utilization() > 0.8);

    let alice = UserId::new("alice");
    h.transport.set_online("alice", true);
    assert_eq!(h.manager.send_detailed(&alice, message("normal")).await, SendOutcome::Deflected);
    assert_eq!(h.manager.queue_depth(&alice), 1);

    let critical = message("critical").with_priority(NotificationPriority::Critical);
    assert_eq!(h.manager.send_detailed(&alice, critical).await, SendOutcome::Delivered);
    assert_eq!(h.transport.titles_for("alice"), vec!["critical"]);
}

#[tokio::test]
async fn test_duplicates_within_window_are_suppressed() {
    let mut cfg = config();
    cfg.notifications.dedup_window_ms = 60_000;
    let h = harness(cfg);
    let user = UserId::new("alice");
    assert!(h.manager.send(&user, message("Storage full")).await);
    assert_eq!(
        h.manager.send_detailed(&user, message("  storage FULL ")).await,
        SendOutcome::Rejected(RejectReason::Duplicate)
    );
    assert!(h.manager.send(&UserId::new("bob"), message("Storage full")).await);
}

#[tokio::test]
async fn test_invalid_messages_are_rejected_before_routing() {
    let h = harness(config());
    let user = UserId::new("alice");
    let bad = message("click").with_action("javascript:alert(1)", "Go");
    assert_eq!(
        h.manager.send_detailed(&user, bad).await,
        SendOutcome::Rejected(RejectReason::Validation)
    );
    assert_eq!(h.manager.queue_depth(&user), 0);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_store_outage_does_not_block_delivery() {
    let h = harness(config());
    h.store.set_unavailable(true);
    let user = UserId::new("alice");

    assert!(h.manager.send(&user, message("still queued")).await);
    assert_eq!(h.manager.queue_depth(&user), 1);
    let stats = h.manager.stats();
    assert_eq!(stats.metrics.persist_failures, 1);
    assert_eq!(stats.metrics.persisted, 0);

    let history = h.manager.get_history(&user, 10).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].title, "still queued");
}

#[tokio::test]
async fn test_cleanup_removes_expired_queue_entries() {
    let h = harness(config());
    let user = UserId::new("alice");
    let short = message("short lived").expires_at(Utc::now() + chrono::Duration::milliseconds(50));
    assert!(h.manager.send(&user, short).await);
    assert!(h.manager.send(&user, message("durable")).await);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let report = h.manager.cleanup_expired().await;
    assert_eq!(report.queued_expired, 1);
    assert_eq!(report.stored_expired, 1);
    assert_eq!(h.manager.queue_depth(&user), 1);

    h.transport.set_online("alice", true);
    assert_eq!(h.manager.replay(&user).await, 1);
    assert_eq!(h.transport.titles_for("alice"), vec!["durable"]);
}

#[tokio::test]
async fn test_expired_messages_are_not_routed() {
    let h = harness(config());
    let user = UserId::new("alice");
    let mut msg = message("late");
    msg.created_at = Utc::now() - chrono::Duration::minutes(10);
    msg.expires_at = Some(Utc::now() - chrono::Duration::minutes(1));
    assert_eq!(
        h.manager.send_detailed(&user, msg).await,
        SendOutcome::Rejected(RejectReason::Expired)
    );
    assert_eq!(h.manager.queue_depth(&user), 0);
}
