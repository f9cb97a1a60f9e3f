//! 远端协议报文（protocol）
//!
//! 请求/响应均为 JSON；事件负载在线上以字符串传输（JSON 文本，或启用加密时为密文）。
//!
use chrono::{DateTime, Utc};
use evbus_domain::subscriber::SubscriberConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FIND_NEXT_EVENTS: &str = "find_next_events";
pub const FIND_DEAD_EVENTS: &str = "find_dead_events";
pub const GET_SUBSCRIBERS: &str = "get_subscribers";
pub const PUBLISH_EVENTS: &str = "publish_events";
pub const MARK_EVENTS_AS_FAILED: &str = "mark_events_as_failed";
pub const MARK_EVENTS_AS_FINISHED: &str = "mark_events_as_finished";
pub const PUT_SUBSCRIBER: &str = "put_subscriber";
pub const REMOVE_SUBSCRIBER: &str = "remove_subscriber";
pub const REMOVE_ALL_SUBSCRIBERS: &str = "remove_all_subscribers";

#[derive(Debug, Serialize)]
pub struct FindEventsRequest<'a> {
    pub subscriber_id: &'a str,
}

/// 线上事件：`payload` 尚未解密/解析
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<WireEvent>,
}

/// 服务端登记的订阅关系（每个事件类型一条）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSubscriber {
    pub id: String,
    pub event_type: String,
    pub config: SubscriberConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscribersResponse {
    pub subscribers: Vec<RemoteSubscriber>,
}

/// 待发布事件（编码前）
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEvent {
    pub event_type: String,
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct PublishedEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: String,
}

#[derive(Debug, Serialize)]
pub struct PublishEventsRequest {
    pub events: Vec<PublishedEvent>,
}

/// 投递结果回报的事件引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    pub id: String,
    pub subscriber_id: String,
}

#[derive(Debug, Serialize)]
pub struct MarkEventsRequest {
    pub events: Vec<EventRef>,
}

#[derive(Debug, Serialize)]
pub struct PutSubscriberRequest<'a> {
    pub subscriber_id: &'a str,
    pub event_type: &'a str,
    pub config: SubscriberConfig,
}

#[derive(Debug, Serialize)]
pub struct RemoveSubscriberRequest<'a> {
    pub event_type: &'a str,
    pub subscriber_id: &'a str,
}
