/// 事件总线示例
/// 设置了 EVBUS_TOKEN 时连接远端服务，否则使用内存总线；
/// 每 2 秒发布一条事件，由一个正常订阅者与一个总是失败、带死信处理的订阅者消费。
use anyhow::Result as AnyResult;
use evbus::{
    BusRegistry, Event, InMemoryBusOptions, NewEvent, RemoteBusOptions, SubscriberConfig,
    SubscriberRegistration, action_fn,
};
use std::time::Duration;

const EVENT_TYPE: &str = "an-example-event";

#[tokio::main]
async fn main() -> AnyResult<()> {
    let registry = BusRegistry::new();
    let bus = if std::env::var("EVBUS_TOKEN").is_ok() {
        registry.remote(&RemoteBusOptions::from_env()?)?
    } else {
        registry.in_memory(&InMemoryBusOptions::default())
    };

    bus.subscribe(
        EVENT_TYPE,
        SubscriberRegistration::builder()
            .id("an-example-subscriber")
            .action(action_fn(|event: Event| async move {
                tracing::info!(event_id = event.id(), payload = %event.payload(), "received event");
                Ok(())
            }))
            .config(SubscriberConfig {
                max_retries: 3,
                timeout: 10,
                concurrency: 500,
            })
            .build(),
    )
    .await;

    bus.subscribe(
        EVENT_TYPE,
        SubscriberRegistration::builder()
            .id("a-flaky-subscriber")
            .action(action_fn(|event: Event| async move {
                Err::<(), _>(anyhow::anyhow!("cannot handle {}", event.id()))
            }))
            .dead_action(action_fn(|event: Event| async move {
                tracing::warn!(event_id = event.id(), "gave up on event");
                Ok(())
            }))
            .config(SubscriberConfig {
                max_retries: 2,
                timeout: 3,
                concurrency: 10,
            })
            .build(),
    )
    .await;

    let handle = bus.clone().run();

    for id in 1..=3 {
        bus.publish(
            NewEvent::builder()
                .id(format!("an-event-id-{id}"))
                .event_type(EVENT_TYPE)
                .payload(serde_json::json!({"welcome": "to the event bus"}))
                .build(),
        )
        .await?;
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    tokio::time::sleep(Duration::from_secs(8)).await;
    handle.shutdown();
    handle.join().await;
    Ok(())
}
