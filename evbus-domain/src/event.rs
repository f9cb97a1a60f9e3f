//! 事件模型（Event / NewEvent）
//!
//! `Event` 为存储层持有的不可变事件记录；`NewEvent` 为发布边界上的事件形态，
//! 其 `id` 与时间戳可缺省，由存储后端在入库时补全或校验。
//!
use crate::error::{BusError, BusResult};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type EventId = String;
pub type EventType = String;

/// 已入库的事件
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct Event {
    /// 事件唯一标识（由调用方提供）
    #[builder(into)]
    id: EventId,
    /// 事件类型，订阅按此匹配
    #[builder(into)]
    #[serde(rename = "type")]
    event_type: EventType,
    /// 事件负载（任意结构化值）
    payload: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Event {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// 待发布的事件
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct NewEvent {
    #[builder(into)]
    id: Option<EventId>,
    #[builder(into)]
    #[serde(rename = "type")]
    event_type: EventType,
    payload: Value,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl NewEvent {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// 转换为入库事件：`id` 缺失时报错，时间戳缺失时取 `now`
    pub fn into_event(self, now: DateTime<Utc>) -> BusResult<Event> {
        let id = self.id.ok_or(BusError::EventIdRequired)?;

        Ok(Event {
            id,
            event_type: self.event_type,
            payload: self.payload,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        })
    }
}

impl From<Event> for NewEvent {
    fn from(event: Event) -> Self {
        Self {
            id: Some(event.id),
            event_type: event.event_type,
            payload: event.payload,
            created_at: Some(event.created_at),
            updated_at: Some(event.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn into_event_requires_id() {
        let ev = NewEvent::builder()
            .event_type("a_type")
            .payload(serde_json::json!({"k": "v"}))
            .build();

        let err = ev.into_event(Utc::now()).unwrap_err();
        assert!(matches!(err, BusError::EventIdRequired));
    }

    #[test]
    fn into_event_keeps_given_timestamps_and_fills_missing() {
        let given = Utc.with_ymd_and_hms(2024, 5, 5, 14, 24, 5).unwrap();
        let now = Utc::now();
        let ev = NewEvent::builder()
            .id("e-1")
            .event_type("a_type")
            .payload(serde_json::json!({}))
            .created_at(given)
            .build()
            .into_event(now)
            .unwrap();

        assert_eq!(ev.id(), "e-1");
        assert_eq!(ev.created_at(), given);
        assert_eq!(ev.updated_at(), now);
    }

    #[test]
    fn serde_uses_type_field_name() {
        let ev = Event::builder()
            .id("e-1")
            .event_type("a_type")
            .payload(serde_json::json!({"hello": "world"}))
            .created_at(Utc::now())
            .updated_at(Utc::now())
            .build();

        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "a_type");
        assert_eq!(json["payload"]["hello"], "world");
    }
}
