mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use common::{gauge, gauge_key, FakeTelemetry};
use fibersight_core::{DashboardConfig, MetricsManager};

fn keys(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn manager(client: &Arc<FakeTelemetry>) -> MetricsManager {
    MetricsManager::builder(client.clone()).build()
}

#[tokio::test]
async fn poll_without_subscriptions_fetches_nothing() {
    let client = FakeTelemetry::new();
    let manager = manager(&client);
    let mut updates = manager.updates();

    assert_eq!(manager.poll().await, 0);
    assert!(client.state_requests().is_empty());
    assert!(updates.try_recv().is_none());
}

#[tokio::test]
async fn poll_requests_union_of_subscriptions() {
    let client = FakeTelemetry::new();
    let manager = manager(&client);

    manager.create_subscription(keys(&["a", "b"]));
    manager.create_subscription(keys(&["b", "c"]));
    manager.poll().await;

    assert_eq!(client.state_requests(), vec![vec!["a", "b", "c"]]);
}

#[tokio::test]
async fn removed_subscription_leaves_the_query() {
    let client = FakeTelemetry::new();
    let manager = manager(&client);

    let a = manager.create_subscription(keys(&["a"]));
    manager.create_subscription(keys(&["b"]));
    manager.remove_subscription(&a);
    manager.remove_subscription(&a);

    assert_eq!(manager.registered_keys(), keys(&["b"]));
    assert_eq!(manager.subscription_count(), 1);
}

#[tokio::test]
async fn modify_replaces_interest_set() {
    let client = FakeTelemetry::new();
    let manager = manager(&client);

    let id = manager.create_subscription(keys(&["a"]));
    manager.modify_subscription(&id, |mut current| {
        current.insert("z".to_string());
        current
    });

    assert_eq!(manager.registered_keys(), keys(&["a", "z"]));
}

#[tokio::test]
async fn poll_publishes_every_returned_state() {
    let client = FakeTelemetry::new();
    client.set_states(vec![gauge("a", 1.0, 10), gauge("b", 2.0, 10)]);
    let manager = manager(&client);
    let mut updates = manager.updates();

    manager.create_subscription(keys(&["a", "b"]));
    assert_eq!(manager.poll().await, 2);

    assert_eq!(updates.recv().await.map(|s| s.id), Some("a".to_string()));
    assert_eq!(updates.recv().await.map(|s| s.id), Some("b".to_string()));
}

#[tokio::test]
async fn fetch_failure_publishes_nothing() {
    let client = FakeTelemetry::new();
    client.set_states(vec![gauge("a", 1.0, 10)]);
    client.fail(true);
    let manager = manager(&client);
    let mut updates = manager.updates();

    manager.create_subscription(keys(&["a"]));
    assert_eq!(manager.poll().await, 0);
    assert!(updates.try_recv().is_none());

    // The next tick recovers.
    client.fail(false);
    assert_eq!(manager.poll().await, 1);
}

#[tokio::test]
async fn reset_drops_every_subscription() {
    let client = FakeTelemetry::new();
    let manager = manager(&client);

    let id = manager.create_subscription(keys(&["a"]));
    let closed = manager.subscription_closed(&id).unwrap();
    manager.reset();

    assert!(closed.is_cancelled());
    assert!(manager.registered_keys().is_empty());
    assert_eq!(manager.poll().await, 0);
}

#[tokio::test]
async fn available_keys_absorbs_failures() {
    let client = FakeTelemetry::new();
    client.set_keys(vec![gauge_key("a"), gauge_key("b")]);
    let manager = manager(&client);

    assert_eq!(manager.available_keys().await.len(), 2);

    client.fail(true);
    assert!(manager.available_keys().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn daemon_polls_on_interval() {
    let client = FakeTelemetry::new();
    client.set_states(vec![gauge("a", 1.0, 10)]);
    let manager = MetricsManager::builder(client.clone())
        .interval(Duration::from_secs(1))
        .build();

    manager.create_subscription(keys(&["a"]));
    let poller = manager.start().unwrap();

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(client.state_requests().len(), 4);

    poller.join().await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(client.state_requests().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn second_start_does_not_double_polling() {
    let client = FakeTelemetry::new();
    let manager = MetricsManager::builder(client.clone())
        .interval(Duration::from_secs(1))
        .build();
    manager.create_subscription(keys(&["a"]));

    let poller = manager.start().unwrap();
    assert!(manager.start().is_none());

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(client.state_requests().len(), 3);

    poller.join().await;
    let restarted = manager.start();
    assert!(restarted.is_some());
}

#[tokio::test(start_paused = true)]
async fn zero_interval_keeps_polling() {
    let client = FakeTelemetry::new();
    client.set_states(vec![gauge("a", 1.0, 10)]);
    let config = DashboardConfig {
        metrics_poll_interval_ms: 0,
        ..DashboardConfig::default()
    };
    let manager = MetricsManager::builder(client.clone())
        .config(&config)
        .build();
    assert!(manager.interval() > Duration::ZERO);

    manager.create_subscription(keys(&["a"]));
    let mut updates = manager.updates();
    let poller = manager.start().unwrap();

    assert!(updates.recv().await.is_some());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!poller.is_finished());
    assert!(client.state_requests().len() > 1);

    poller.join().await;
}

#[tokio::test]
async fn concurrent_subscribers_keep_union_consistent() {
    let client = FakeTelemetry::new();
    let manager = manager(&client);

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move {
                let id = manager.create_subscription(keys(&["shared"]));
                manager.modify_subscription(&id, |mut current| {
                    current.insert(format!("m{i}"));
                    current
                });
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let union = manager.registered_keys();
    assert_eq!(union.len(), 17);
    assert!(union.contains("shared"));
    assert_eq!(manager.subscription_count(), 16);
}
