//! 远端客户端（RemoteClient）
//!
//! 将存储操作一一映射为协议调用，并负责：
//! - 空轮询退避：按订阅者记录等待时长，每次空结果 +1s（上限 30s），有结果即归零，
//!   下次轮询前先等待；
//! - 负载编解码：配置了 `Cipher` 时，发出前序列化再加密，收到后解密再解析；
//!   无法解码的事件立即回报失败（消耗一次重试）并从本批结果中剔除。
//!
use crate::cipher::Cipher;
use crate::protocol::{
    self, EventRef, EventsResponse, FindEventsRequest, MarkEventsRequest, OutgoingEvent,
    PublishEventsRequest, PublishedEvent, PutSubscriberRequest, RemoteSubscriber,
    RemoveSubscriberRequest, SubscribersResponse, WireEvent,
};
use crate::transport::Transport;
use async_trait::async_trait;
use dashmap::DashMap;
use evbus_domain::error::BusResult as Result;
use evbus_domain::event::Event;
use evbus_domain::subscriber::{Subscriber, SubscriberId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const BACKOFF_STEP: Duration = Duration::from_millis(1000);
const BACKOFF_MAX: Duration = Duration::from_millis(30000);

/// 远端协议能力：批量存储只依赖该协议，便于替换与测试
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn find_next_events(&self, subscriber_id: &str) -> Result<Vec<Event>>;

    async fn find_dead_events(&self, subscriber_id: &str) -> Result<Vec<Event>>;

    async fn get_subscribers(&self) -> Result<Vec<RemoteSubscriber>>;

    async fn publish_events(&self, events: Vec<OutgoingEvent>) -> Result<()>;

    async fn mark_events_as_failed(&self, events: Vec<EventRef>) -> Result<()>;

    async fn mark_events_as_finished(&self, events: Vec<EventRef>) -> Result<()>;

    async fn put_subscriber(&self, event_type: &str, subscriber: &Subscriber) -> Result<()>;

    async fn remove_subscriber(&self, event_type: &str, subscriber_id: &str) -> Result<()>;

    async fn remove_all_subscribers(&self) -> Result<()>;
}

pub struct RemoteClient {
    transport: Arc<dyn Transport>,
    cipher: Option<Arc<dyn Cipher>>,
    poll_delays: DashMap<SubscriberId, Duration>,
}

impl RemoteClient {
    pub fn new(transport: Arc<dyn Transport>, cipher: Option<Arc<dyn Cipher>>) -> Self {
        Self {
            transport,
            cipher,
            poll_delays: DashMap::new(),
        }
    }

    /// 下一次轮询该订阅者前需等待的时长
    pub fn poll_delay(&self, subscriber_id: &str) -> Duration {
        self.poll_delays
            .get(subscriber_id)
            .map(|d| *d)
            .unwrap_or(Duration::ZERO)
    }

    fn record_poll(&self, subscriber_id: &str, empty: bool) {
        if empty {
            let mut delay = self
                .poll_delays
                .entry(subscriber_id.to_string())
                .or_insert(Duration::ZERO);
            *delay = (*delay + BACKOFF_STEP).min(BACKOFF_MAX);
        } else {
            self.poll_delays.remove(subscriber_id);
        }
    }

    async fn call<T: DeserializeOwned>(&self, path: &str, body: Option<Value>) -> Result<T> {
        let value = self.transport.post(path, body).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn send<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let body = serde_json::to_value(body)?;
        self.transport.post(path, Some(body)).await?;
        Ok(())
    }

    fn encode_payload(&self, payload: &Value) -> Result<String> {
        let text = serde_json::to_string(payload)?;
        match &self.cipher {
            Some(cipher) => cipher.encrypt(&text),
            None => Ok(text),
        }
    }

    fn decode(&self, wire: &WireEvent) -> Result<Event> {
        let text = match &self.cipher {
            Some(cipher) => cipher.decrypt(&wire.payload)?,
            None => wire.payload.clone(),
        };
        let payload: Value = serde_json::from_str(&text)?;

        Ok(Event::builder()
            .id(wire.id.clone())
            .event_type(wire.event_type.clone())
            .payload(payload)
            .created_at(wire.created_at)
            .updated_at(wire.updated_at)
            .build())
    }

    async fn decode_events(&self, subscriber_id: &str, wire: Vec<WireEvent>) -> Vec<Event> {
        let mut events = Vec::with_capacity(wire.len());

        for item in wire {
            match self.decode(&item) {
                Ok(event) => events.push(event),
                Err(error) => {
                    tracing::error!(event_id = %item.id, subscriber_id, %error, "undecodable event");
                    let poisoned = vec![EventRef {
                        id: item.id.clone(),
                        subscriber_id: subscriber_id.to_string(),
                    }];
                    if let Err(error) = self.mark_events_as_failed(poisoned).await {
                        tracing::error!(
                            event_id = %item.id,
                            subscriber_id,
                            %error,
                            "reporting undecodable event failed"
                        );
                    }
                }
            }
        }
        events
    }

    async fn find_events(&self, path: &str, subscriber_id: &str) -> Result<Vec<WireEvent>> {
        let body = serde_json::to_value(FindEventsRequest { subscriber_id })?;
        let response: EventsResponse = self.call(path, Some(body)).await?;
        Ok(response.events)
    }
}

#[async_trait]
impl RemoteApi for RemoteClient {
    async fn find_next_events(&self, subscriber_id: &str) -> Result<Vec<Event>> {
        let delay = self.poll_delay(subscriber_id);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let wire = self
            .find_events(protocol::FIND_NEXT_EVENTS, subscriber_id)
            .await?;
        self.record_poll(subscriber_id, wire.is_empty());

        Ok(self.decode_events(subscriber_id, wire).await)
    }

    async fn find_dead_events(&self, subscriber_id: &str) -> Result<Vec<Event>> {
        let wire = self
            .find_events(protocol::FIND_DEAD_EVENTS, subscriber_id)
            .await?;
        Ok(self.decode_events(subscriber_id, wire).await)
    }

    async fn get_subscribers(&self) -> Result<Vec<RemoteSubscriber>> {
        let response: SubscribersResponse = self.call(protocol::GET_SUBSCRIBERS, None).await?;
        Ok(response.subscribers)
    }

    async fn publish_events(&self, events: Vec<OutgoingEvent>) -> Result<()> {
        let events = events
            .into_iter()
            .map(|e| {
                Ok(PublishedEvent {
                    payload: self.encode_payload(&e.payload)?,
                    event_type: e.event_type,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.send(protocol::PUBLISH_EVENTS, &PublishEventsRequest { events })
            .await
    }

    async fn mark_events_as_failed(&self, events: Vec<EventRef>) -> Result<()> {
        self.send(protocol::MARK_EVENTS_AS_FAILED, &MarkEventsRequest { events })
            .await
    }

    async fn mark_events_as_finished(&self, events: Vec<EventRef>) -> Result<()> {
        self.send(protocol::MARK_EVENTS_AS_FINISHED, &MarkEventsRequest { events })
            .await
    }

    async fn put_subscriber(&self, event_type: &str, subscriber: &Subscriber) -> Result<()> {
        let body = PutSubscriberRequest {
            subscriber_id: &subscriber.id,
            event_type,
            config: subscriber.config,
        };
        self.send(protocol::PUT_SUBSCRIBER, &body).await
    }

    async fn remove_subscriber(&self, event_type: &str, subscriber_id: &str) -> Result<()> {
        let body = RemoveSubscriberRequest {
            event_type,
            subscriber_id,
        };
        self.send(protocol::REMOVE_SUBSCRIBER, &body).await
    }

    async fn remove_all_subscribers(&self) -> Result<()> {
        self.transport
            .post(protocol::REMOVE_ALL_SUBSCRIBERS, None)
            .await?;
        Ok(())
    }
}
