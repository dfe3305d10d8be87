//! Batched delivery to live sessions.

mod helpers;

use std::time::Duration;

use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_database::NotificationStore;
use notifyhub_entity::NotificationPriority;
use notifyhub_realtime::SendOutcome;

use helpers::{Harness, config, harness, message};

fn batching_config() -> notifyhub_core::config::AppConfig {
    let mut cfg = config();
    cfg.performance.batching.enabled = true;
    cfg.performance.batching.max_batch_size = Some(10);
    cfg.performance.batching.batch_timeout_ms = Some(100);
    cfg.performance.batching.compression_threshold_bytes = Some(10 * 1024 * 1024);
    cfg
}

async fn stored_delivered(h: &Harness, id: &NotificationId) -> bool {
    h.store
        .find(id)
        .await
        .unwrap()
        .is_some_and(|row| row.is_delivered())
}

#[tokio::test(start_paused = true)]
async fn test_batch_flushes_once_on_timeout() {
    let h = harness(batching_config());
    h.transport.set_online("alice", true);
    let user = UserId::new("alice");

    for i in 0..3 {
        assert_eq!(
            h.manager.send_detailed(&user, message(&format!("b{i}"))).await,
            SendOutcome::Batched
        );
    }
    assert!(h.transport.frames().is_empty());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.transport.titles_for("alice"), vec!["b0", "b1", "b2"]);

    let stats = h.manager.stats();
    assert_eq!(stats.performance.batch.batches_flushed, 1);
    assert_eq!(stats.performance.batch.timeout_flushes, 1);
    assert_eq!(stats.performance.batch.pending_batches, 0);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.transport.frames().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_critical_messages_skip_the_batcher() {
    let h = harness(batching_config());
    h.transport.set_online("alice", true);
    let user = UserId::new("alice");

    assert_eq!(h.manager.send_detailed(&user, message("slow")).await, SendOutcome::Batched);
    let urgent = message("urgent").with_priority(NotificationPriority::Critical);
    assert_eq!(h.manager.send_detailed(&user, urgent).await, SendOutcome::Delivered);
    assert_eq!(h.transport.titles_for("alice"), vec!["urgent"]);

    assert_eq!(h.manager.flush().await, 1);
    assert_eq!(h.transport.titles_for("alice"), vec!["urgent", "slow"]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_batch_members_move_to_retry_queue() {
    let h = harness(batching_config());
    h.transport.set_online("alice", true);
    let user = UserId::new("alice");

    h.manager.send(&user, message("first")).await;
    h.manager.send(&user, message("second")).await;
    h.transport.set_failing(true);
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(h.transport.frames().is_empty());
    assert_eq!(h.manager.queue_depth(&user), 2);

    h.transport.set_failing(false);
    assert_eq!(h.manager.replay(&user).await, 2);
    assert_eq!(h.transport.titles_for("alice"), vec!["first", "second"]);
}

#[tokio::test(start_paused = true)]
async fn test_size_flush_persists_delivered_flag() {
    let mut cfg = batching_config();
    cfg.performance.batching.max_batch_size = Some(2);
    let h = harness(cfg);
    h.transport.set_online("alice", true);
    let user = UserId::new("alice");

    let first = message("b0");
    let second = message("b1");
    let ids = [first.id.clone(), second.id.clone()];
    assert_eq!(h.manager.send_detailed(&user, first).await, SendOutcome::Batched);
    assert_eq!(h.manager.send_detailed(&user, second).await, SendOutcome::Batched);
    assert_eq!(h.transport.titles_for("alice"), vec!["b0", "b1"]);

    for id in &ids {
        assert!(stored_delivered(&h, id).await);
    }
    let history = h.manager.get_history(&user, 10).await;
    assert!(history.iter().all(|m| m.is_delivered()));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_flush_persists_delivered_flag() {
    let h = harness(batching_config());
    h.transport.set_online("alice", true);
    let user = UserId::new("alice");

    let msg = message("later");
    let id = msg.id.clone();
    assert_eq!(h.manager.send_detailed(&user, msg).await, SendOutcome::Batched);
    assert!(!stored_delivered(&h, &id).await);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(stored_delivered(&h, &id).await);
}

#[tokio::test(start_paused = true)]
async fn test_flush_updates_in_memory_history() {
    let mut cfg = batching_config();
    cfg.notifications.persist_enabled = false;
    let h = harness(cfg);
    h.transport.set_online("alice", true);
    let user = UserId::new("alice");

    h.manager.send(&user, message("b0")).await;
    assert!(!h.manager.get_history(&user, 10).await[0].is_delivered());
    assert_eq!(h.manager.flush().await, 1);

    let history = h.manager.get_history(&user, 10).await;
    assert_eq!(history.len(), 1);
    assert!(history[0].is_delivered());
    assert!(h.store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_is_not_cached_as_delivered() {
    let h = harness(batching_config());
    h.transport.set_online("alice", true);
    let user = UserId::new("alice");

    let msg = message("retry me");
    let id = msg.id.clone();
    h.manager.send(&user, msg.clone()).await;
    h.transport.set_failing(true);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!stored_delivered(&h, &id).await);

    h.transport.set_failing(false);
    assert_eq!(h.manager.send_detailed(&user, msg).await, SendOutcome::Batched);
    assert_eq!(h.manager.stats().performance.cache_short_circuits, 0);
}
