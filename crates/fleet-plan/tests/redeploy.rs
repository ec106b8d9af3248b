//! Standard fleet trigger rules driven through the redeploy coordinator

use fleet_redeploy::{ChannelSink, CoordinatorConfig, RedeployCoordinator, ServiceSet};
use fleet_types::{ChangeEvent, EventId, ServiceFleetSpec};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn settings(id: &str, field: &str) -> ChangeEvent {
    ChangeEvent::new(id)
        .with_attribute("source", "settings")
        .with_attribute("field", field)
}

#[tokio::test(start_paused = true)]
async fn auth_settings_coalesce_while_storage_flushes_separately() {
    let spec = ServiceFleetSpec::standard();
    let (sink, mut rx) = ChannelSink::new(16);
    let (handle, _task) = RedeployCoordinator::spawn(
        spec.trigger_rules.clone(),
        CoordinatorConfig::default(),
        Arc::new(sink),
    );
    let start = Instant::now();

    handle.submit(settings("evt-1", "authProvider")).unwrap();
    sleep(Duration::from_secs(2)).await;
    handle.submit(settings("evt-2", "authProvider")).unwrap();
    handle
        .submit(settings("evt-3", "storage.fileSizeLimit"))
        .unwrap();

    let auth = rx.recv().await.unwrap();
    assert_eq!(auth.request.services, ["auth"].into_iter().collect::<ServiceSet>());
    assert_eq!(
        auth.request.cause_event_ids,
        vec![EventId::new("evt-1"), EventId::new("evt-2")]
    );
    assert!(auth.request.rules.contains("auth-provider-settings"));
    assert!(start.elapsed() < Duration::from_secs(31));
    auth.acknowledge();

    let storage = rx.recv().await.unwrap();
    assert_eq!(
        storage.request.services,
        ["storage", "imgproxy"].into_iter().collect::<ServiceSet>()
    );
    assert_eq!(storage.request.cause_event_ids, vec![EventId::new("evt-3")]);
    storage.acknowledge();
}

#[tokio::test(start_paused = true)]
async fn smtp_and_provider_changes_share_the_auth_window() {
    let spec = ServiceFleetSpec::standard();
    let (sink, mut rx) = ChannelSink::new(16);
    let (handle, _task) = RedeployCoordinator::spawn(
        spec.trigger_rules.clone(),
        CoordinatorConfig::default(),
        Arc::new(sink),
    );

    handle.submit(settings("evt-1", "smtpHost")).unwrap();
    sleep(Duration::from_secs(10)).await;
    handle.submit(settings("evt-2", "authProvider")).unwrap();

    let delivery = rx.recv().await.unwrap();
    assert_eq!(delivery.request.cause_event_ids.len(), 2);
    assert_eq!(delivery.request.rules.len(), 2);
    delivery.acknowledge();
}

#[tokio::test(start_paused = true)]
async fn signing_secret_rotation_redeploys_every_token_consumer() {
    let spec = ServiceFleetSpec::standard();
    let (sink, mut rx) = ChannelSink::new(16);
    let (handle, _task) = RedeployCoordinator::spawn(
        spec.trigger_rules.clone(),
        CoordinatorConfig::default(),
        Arc::new(sink),
    );

    handle
        .submit(
            ChangeEvent::new("rot-1")
                .with_attribute("source", "secrets")
                .with_attribute("secret", "jwt"),
        )
        .unwrap();

    let delivery = rx.recv().await.unwrap();
    for consumer in spec.services.iter().filter(|s| s.consumes_tokens()) {
        assert!(delivery.request.services.contains(consumer.name.as_str()));
    }
    assert!(!delivery.request.services.contains("meta"));
    delivery.acknowledge();

    handle.shutdown().await.unwrap();
    assert_eq!(handle.stats().delivered, 1);
}
