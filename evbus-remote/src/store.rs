//! 远端事件存储（RemoteEventStore）
//!
//! 以 `RemoteApi` 实现 `EventStore` 协议：
//! - 发布、成功回报、失败回报三类高频操作各自经 `Batcher` 合并；
//! - 拉取事件与订阅管理直接透传。
//!
use crate::batch::Batcher;
use crate::client::RemoteApi;
use crate::protocol::{EventRef, OutgoingEvent};
use async_trait::async_trait;
use evbus_domain::error::BusResult as Result;
use evbus_domain::event::{Event, NewEvent};
use evbus_domain::eventing::EventStore;
use evbus_domain::subscriber::Subscriber;
use futures_util::FutureExt;
use std::collections::HashSet;
use std::sync::Arc;

pub struct RemoteEventStore {
    api: Arc<dyn RemoteApi>,
    publish: Batcher<OutgoingEvent>,
    finish: Batcher<EventRef>,
    fail: Batcher<EventRef>,
}

impl RemoteEventStore {
    pub fn new(api: Arc<dyn RemoteApi>) -> Self {
        let publish = {
            let api = api.clone();
            Batcher::new("publish_events", move |events: Vec<OutgoingEvent>| {
                let api = api.clone();
                async move { api.publish_events(events).await }.boxed()
            })
        };
        let finish = {
            let api = api.clone();
            Batcher::new("mark_events_as_finished", move |refs: Vec<EventRef>| {
                let api = api.clone();
                async move { api.mark_events_as_finished(refs).await }.boxed()
            })
        };
        let fail = {
            let api = api.clone();
            Batcher::new("mark_events_as_failed", move |refs: Vec<EventRef>| {
                let api = api.clone();
                async move { api.mark_events_as_failed(refs).await }.boxed()
            })
        };

        Self {
            api,
            publish,
            finish,
            fail,
        }
    }

    fn event_ref(event: &Event, subscriber: &Subscriber) -> EventRef {
        EventRef {
            id: event.id().to_string(),
            subscriber_id: subscriber.id.clone(),
        }
    }
}

#[async_trait]
impl EventStore for RemoteEventStore {
    async fn find_next_events_for(&self, subscriber: &Subscriber) -> Result<Vec<Event>> {
        self.api.find_next_events(&subscriber.id).await
    }

    async fn find_dead_events_for(&self, subscriber: &Subscriber) -> Result<Vec<Event>> {
        self.api.find_dead_events(&subscriber.id).await
    }

    async fn get_subscribers(&self) -> Result<Vec<Subscriber>> {
        // 服务端按事件类型各登记一条，这里按 id 去重
        let mut seen = HashSet::new();
        Ok(self
            .api
            .get_subscribers()
            .await?
            .into_iter()
            .filter(|s| seen.insert(s.id.clone()))
            .map(|s| Subscriber::new(s.id, s.config))
            .collect())
    }

    async fn get_subscribers_by_event_type(&self, event_type: &str) -> Result<Vec<Subscriber>> {
        Ok(self
            .api
            .get_subscribers()
            .await?
            .into_iter()
            .filter(|s| s.event_type == event_type)
            .map(|s| Subscriber::new(s.id, s.config))
            .collect())
    }

    async fn subscribe(&self, event_type: &str, subscriber: &Subscriber) -> Result<()> {
        self.api.put_subscriber(event_type, subscriber).await
    }

    async fn unsubscribe(&self, event_type: &str, subscriber_id: &str) -> Result<()> {
        self.api.remove_subscriber(event_type, subscriber_id).await
    }

    async fn unsubscribe_all(&self) -> Result<()> {
        self.api.remove_all_subscribers().await
    }

    async fn mark_as_failed(&self, event: &Event, subscriber: &Subscriber) -> Result<()> {
        self.fail.submit(Self::event_ref(event, subscriber)).await
    }

    async fn mark_as_finished(&self, event: &Event, subscriber: &Subscriber) -> Result<()> {
        self.finish.submit(Self::event_ref(event, subscriber)).await
    }

    /// 事件 id 由服务端分配，发布时无需提供
    async fn put(&self, event: NewEvent) -> Result<()> {
        self.publish
            .submit(OutgoingEvent {
                event_type: event.event_type().to_string(),
                payload: event.payload().clone(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RemoteSubscriber;
    use evbus_domain::subscriber::SubscriberConfig;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubApi {
        subscribers: Vec<RemoteSubscriber>,
        published: Mutex<Vec<Vec<OutgoingEvent>>>,
    }

    #[async_trait]
    impl RemoteApi for StubApi {
        async fn find_next_events(&self, _: &str) -> Result<Vec<Event>> {
            Ok(vec![])
        }
        async fn find_dead_events(&self, _: &str) -> Result<Vec<Event>> {
            Ok(vec![])
        }
        async fn get_subscribers(&self) -> Result<Vec<RemoteSubscriber>> {
            Ok(self.subscribers.clone())
        }
        async fn publish_events(&self, events: Vec<OutgoingEvent>) -> Result<()> {
            self.published.lock().unwrap().push(events);
            Ok(())
        }
        async fn mark_events_as_failed(&self, _: Vec<EventRef>) -> Result<()> {
            Ok(())
        }
        async fn mark_events_as_finished(&self, _: Vec<EventRef>) -> Result<()> {
            Ok(())
        }
        async fn put_subscriber(&self, _: &str, _: &Subscriber) -> Result<()> {
            Ok(())
        }
        async fn remove_subscriber(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
        async fn remove_all_subscribers(&self) -> Result<()> {
            Ok(())
        }
    }

    fn remote(id: &str, event_type: &str) -> RemoteSubscriber {
        RemoteSubscriber {
            id: id.into(),
            event_type: event_type.into(),
            config: SubscriberConfig::default(),
        }
    }

    #[tokio::test]
    async fn subscribers_are_deduplicated_and_filtered() {
        let api = Arc::new(StubApi {
            subscribers: vec![remote("a", "t1"), remote("a", "t2"), remote("b", "t2")],
            ..Default::default()
        });
        let store = RemoteEventStore::new(api);

        let all: Vec<String> = store
            .get_subscribers()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(all, vec!["a", "b"]);

        let t2 = store.get_subscribers_by_event_type("t2").await.unwrap();
        assert_eq!(t2.len(), 2);
        assert!(store.get_subscribers_by_event_type("t3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_does_not_require_an_id() {
        let api = Arc::new(StubApi::default());
        let store = RemoteEventStore::new(api.clone());

        store
            .put(
                NewEvent::builder()
                    .event_type("t")
                    .payload(serde_json::json!({"n": 1}))
                    .build(),
            )
            .await
            .unwrap();

        let published = api.published.lock().unwrap().clone();
        assert_eq!(
            published,
            vec![vec![OutgoingEvent {
                event_type: "t".into(),
                payload: serde_json::json!({"n": 1}),
            }]]
        );
    }
}
