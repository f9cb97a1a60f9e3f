//! 内存版事件存储（InMemoryEventStore）
//!
//! 基于进程内队列实现 `EventStore` 协议，适用于测试与单进程部署：
//! - `put`：发布时按事件类型扇出到每个订阅者的 FIFO 队列，仅扇出一次；
//! - `find_next_events_for`：从队首取出至多 `concurrency` 条，重试次数已达上限的
//!   事件不再返回，而是转入该订阅者的死信队列；
//! - `mark_as_failed`：重试计数 +1 并重新排到队尾，达到上限时直接转入死信队列；
//! - `find_dead_events_for`：取出死信队列中的事件；
//! - `unsubscribe`：只清理被退订类型的事件，订阅者无剩余订阅时清空其全部状态。
//!
//! 所有状态由一把异步互斥锁保护，取出与回填不会交错。

use crate::error::BusResult as Result;
use crate::event::{Event, EventId, EventType, NewEvent};
use crate::eventing::EventStore;
use crate::subscriber::{Subscriber, SubscriberId};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::Mutex;

#[derive(Default)]
struct State {
    subscribers: HashMap<EventType, Vec<Subscriber>>,
    pending: HashMap<SubscriberId, VecDeque<Event>>,
    retries: HashMap<SubscriberId, HashMap<EventId, u32>>,
    dead: HashMap<SubscriberId, VecDeque<Event>>,
}

impl State {
    fn retry_count(&self, subscriber_id: &str, event_id: &str) -> u32 {
        self.retries
            .get(subscriber_id)
            .and_then(|r| r.get(event_id))
            .copied()
            .unwrap_or(0)
    }

    fn forget(&mut self, subscriber_id: &str) {
        self.pending.remove(subscriber_id);
        self.retries.remove(subscriber_id);
        self.dead.remove(subscriber_id);
    }

    /// 只丢弃某一事件类型的在途事件与计数，其余订阅关系的事件保留
    fn forget_type(&mut self, subscriber_id: &str, event_type: &str) {
        let mut dropped: Vec<EventId> = Vec::new();
        for queues in [&mut self.pending, &mut self.dead] {
            if let Some(queue) = queues.get_mut(subscriber_id) {
                queue.retain(|ev| {
                    let keep = ev.event_type() != event_type;
                    if !keep {
                        dropped.push(ev.id().to_string());
                    }
                    keep
                });
            }
        }

        if let Some(retries) = self.retries.get_mut(subscriber_id) {
            for id in &dropped {
                retries.remove(id);
            }
        }
    }

    fn is_subscribed(&self, subscriber_id: &str) -> bool {
        self.subscribers
            .values()
            .flatten()
            .any(|s| s.id == subscriber_id)
    }
}

/// 简单的内存事件存储实现
#[derive(Default)]
pub struct InMemoryEventStore {
    state: Mutex<State>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前所有队列（含死信）中事件的类型与负载，按事件 id 去重
    pub async fn events_summary(&self) -> Vec<(EventType, Value)> {
        let state = self.state.lock().await;
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();

        for ev in state.pending.values().chain(state.dead.values()).flatten() {
            if seen.insert(ev.id()) {
                out.push((ev.event_type().to_string(), ev.payload().clone()));
            }
        }
        out
    }

    /// 查看某订阅者对某事件的重试计数
    pub async fn retry_count(&self, subscriber_id: &str, event_id: &str) -> Option<u32> {
        let state = self.state.lock().await;
        state
            .retries
            .get(subscriber_id)
            .and_then(|r| r.get(event_id))
            .copied()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn find_next_events_for(&self, subscriber: &Subscriber) -> Result<Vec<Event>> {
        let mut state = self.state.lock().await;
        let Some(queue) = state.pending.get_mut(&subscriber.id) else {
            return Ok(Vec::new());
        };

        let take = subscriber.config.concurrency.min(queue.len());
        let batch: Vec<Event> = queue.drain(..take).collect();

        let mut next = Vec::with_capacity(batch.len());
        let mut retired = Vec::new();
        for ev in batch {
            if state.retry_count(&subscriber.id, ev.id()) < subscriber.config.max_retries {
                next.push(ev);
            } else {
                retired.push(ev);
            }
        }

        if !retired.is_empty() {
            state
                .dead
                .entry(subscriber.id.clone())
                .or_default()
                .extend(retired);
        }

        Ok(next)
    }

    async fn find_dead_events_for(&self, subscriber: &Subscriber) -> Result<Vec<Event>> {
        let mut state = self.state.lock().await;
        let Some(queue) = state.dead.get_mut(&subscriber.id) else {
            return Ok(Vec::new());
        };

        let take = subscriber.config.concurrency.min(queue.len());
        Ok(queue.drain(..take).collect())
    }

    async fn get_subscribers(&self) -> Result<Vec<Subscriber>> {
        let state = self.state.lock().await;
        let mut seen: HashSet<&str> = HashSet::new();

        Ok(state
            .subscribers
            .values()
            .flatten()
            .filter(|s| seen.insert(s.id.as_str()))
            .cloned()
            .collect())
    }

    async fn get_subscribers_by_event_type(&self, event_type: &str) -> Result<Vec<Subscriber>> {
        let state = self.state.lock().await;
        Ok(state
            .subscribers
            .get(event_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn subscribe(&self, event_type: &str, subscriber: &Subscriber) -> Result<()> {
        let mut state = self.state.lock().await;
        let list = state.subscribers.entry(event_type.to_string()).or_default();

        match list.iter_mut().find(|s| s.id == subscriber.id) {
            Some(existing) => *existing = subscriber.clone(),
            None => list.push(subscriber.clone()),
        }
        Ok(())
    }

    async fn unsubscribe(&self, event_type: &str, subscriber_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(list) = state.subscribers.get_mut(event_type) {
            list.retain(|s| s.id != subscriber_id);
            if list.is_empty() {
                state.subscribers.remove(event_type);
            }
        }

        if state.is_subscribed(subscriber_id) {
            state.forget_type(subscriber_id, event_type);
        } else {
            state.forget(subscriber_id);
        }
        Ok(())
    }

    async fn unsubscribe_all(&self) -> Result<()> {
        *self.state.lock().await = State::default();
        Ok(())
    }

    async fn mark_as_failed(&self, event: &Event, subscriber: &Subscriber) -> Result<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let count = state
            .retries
            .entry(subscriber.id.clone())
            .or_default()
            .entry(event.id().to_string())
            .or_insert(0);
        *count += 1;

        // 达到上限即转入死信，不再排队等待下一次拉取
        let queues = if *count >= subscriber.config.max_retries {
            &mut state.dead
        } else {
            &mut state.pending
        };
        queues
            .entry(subscriber.id.clone())
            .or_default()
            .push_back(event.clone());
        Ok(())
    }

    async fn mark_as_finished(&self, event: &Event, subscriber: &Subscriber) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(retries) = state.retries.get_mut(&subscriber.id) {
            retries.remove(event.id());
        }
        Ok(())
    }

    async fn put(&self, event: NewEvent) -> Result<()> {
        let event = event.into_event(Utc::now())?;
        let mut state = self.state.lock().await;

        let targets: Vec<SubscriberId> = state
            .subscribers
            .get(event.event_type())
            .map(|list| list.iter().map(|s| s.id.clone()).collect())
            .unwrap_or_default();

        for subscriber_id in targets {
            state
                .retries
                .entry(subscriber_id.clone())
                .or_default()
                .entry(event.id().to_string())
                .or_insert(0);
            state
                .pending
                .entry(subscriber_id)
                .or_default()
                .push_back(event.clone());
        }
        Ok(())
    }
}
