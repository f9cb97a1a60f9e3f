use anyhow::Result as AnyResult;
use evbus::{
    BusError, BusRegistry, Event, InMemoryBusOptions, NewEvent, SubscriberConfig,
    SubscriberRegistration, action_fn,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn registry_bus_delivers_and_routes_dead_letters() -> AnyResult<()> {
    let registry = BusRegistry::new();
    let bus = registry.in_memory(
        &InMemoryBusOptions::builder()
            .poll_interval(Duration::from_millis(100))
            .build(),
    );

    let delivered = Arc::new(Mutex::new(Vec::<String>::new()));
    let dead = Arc::new(AtomicUsize::new(0));

    let sink = delivered.clone();
    bus.subscribe(
        "page.viewed",
        SubscriberRegistration::builder()
            .id("analytics")
            .action(action_fn(move |ev: Event| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(ev.id().to_string());
                    Ok(())
                }
            }))
            .build(),
    )
    .await;

    let dead_counter = dead.clone();
    bus.subscribe(
        "page.viewed",
        SubscriberRegistration::builder()
            .id("notifier")
            .action(action_fn(|_ev: Event| async { Err::<(), _>(anyhow::anyhow!("smtp down")) }))
            .dead_action(action_fn(move |_ev: Event| {
                let dead_counter = dead_counter.clone();
                async move {
                    dead_counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }))
            .config(SubscriberConfig {
                max_retries: 2,
                timeout: 1,
                concurrency: 5,
            })
            .build(),
    )
    .await;

    // 同一注册表返回同一总线
    let same = registry.in_memory(&InMemoryBusOptions::default());
    assert!(Arc::ptr_eq(&bus, &same));

    bus.publish(
        NewEvent::builder()
            .id("pv-1")
            .event_type("page.viewed")
            .payload(serde_json::json!({"path": "/"}))
            .build(),
    )
    .await?;

    let handle = bus.clone().run();
    tokio::time::sleep(Duration::from_secs(5)).await;
    handle.shutdown();
    handle.join().await;

    assert_eq!(*delivered.lock().unwrap(), vec!["pv-1"]);
    assert_eq!(dead.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn publish_without_id_is_rejected() {
    let bus = BusRegistry::new().in_memory(&InMemoryBusOptions::default());
    let err = bus
        .publish(
            NewEvent::builder()
                .event_type("page.viewed")
                .payload(serde_json::json!({}))
                .build(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BusError::EventIdRequired));
}
