//! 事件总线引擎（EventBus）
//!
//! 统一编排“订阅 → 调度 → 投递 → 回报”的长驻任务：
//! - 进程内持有订阅者动作表（按订阅者 id），存储层只负责决定投递哪些事件；
//! - 调度循环逐轮执行，本轮全部结束后再等待 `poll_interval` 进入下一轮，轮次不重叠；
//! - 每轮内各订阅者并发执行，订阅者内各事件并发投递；
//! - 失败回报存储，`timeout` 秒后该订阅者进入死信检查，无死信动作的死信事件被丢弃；
//! - 提供关闭与等待的 `BusHandle`。
//!
use super::{EventStore, SubscriberAction};
use crate::error::{BusError, BusResult};
use crate::event::{Event, NewEvent};
use crate::subscriber::{Subscriber, SubscriberConfig, SubscriberId};
use bon::Builder;
use dashmap::DashMap;
use futures_util::{FutureExt, StreamExt, stream};
use std::panic::AssertUnwindSafe;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// EventBus：
/// - 订阅/退订/发布转发给存储，后端错误记录日志后吞掉
/// - `run` 启动调度循环，从存储拉取事件并调用进程内的订阅者动作
#[derive(Builder)]
pub struct EventBus {
    store: Arc<dyn EventStore>,
    #[builder(default)]
    config: EventBusConfig,
    #[builder(skip)]
    actions: DashMap<SubscriberId, RegisteredActions>,
    #[builder(skip)]
    dead_letters: DashMap<SubscriberId, DeadLetterState>,
}

/// 订阅登记：动作只保存在本进程内，存储只记录 id 与配置
#[derive(Builder)]
pub struct SubscriberRegistration {
    #[builder(into)]
    id: SubscriberId,
    action: Arc<dyn SubscriberAction>,
    #[builder(default)]
    config: SubscriberConfig,
    dead_action: Option<Arc<dyn SubscriberAction>>,
}

#[derive(Clone)]
struct RegisteredActions {
    action: Arc<dyn SubscriberAction>,
    dead_action: Option<Arc<dyn SubscriberAction>>,
}

#[derive(Clone, Debug, Default)]
struct DeadLetterState {
    /// 每次投递失败后允许检查死信的时刻（失败时间 + timeout）
    checks_due: Vec<Instant>,
    /// 上一轮死信查询返回过事件
    has_dead_events: bool,
}

impl DeadLetterState {
    fn recently_failed(&self, now: Instant) -> bool {
        self.checks_due.iter().any(|due| *due <= now)
    }
}

enum Delivery {
    Pending(Event),
    Dead(Event),
}

impl EventBus {
    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// 注册订阅者：先登记动作，再请求存储持久化订阅关系
    pub async fn subscribe(&self, event_type: &str, registration: SubscriberRegistration) {
        let SubscriberRegistration {
            id,
            action,
            config,
            dead_action,
        } = registration;

        self.actions.insert(
            id.clone(),
            RegisteredActions {
                action,
                dead_action,
            },
        );

        let subscriber = Subscriber::new(id, config);
        if let Err(error) = self.store.subscribe(event_type, &subscriber).await {
            tracing::error!(
                event_type,
                subscriber_id = %subscriber.id,
                %error,
                "subscribe failed"
            );
        }
    }

    pub async fn unsubscribe(&self, event_type: &str, subscriber_id: &str) {
        if let Err(error) = self.store.unsubscribe(event_type, subscriber_id).await {
            tracing::error!(event_type, subscriber_id, %error, "unsubscribe failed");
        }
    }

    pub async fn unsubscribe_all(&self) {
        self.actions.clear();
        self.dead_letters.clear();
        if let Err(error) = self.store.unsubscribe_all().await {
            tracing::error!(%error, "unsubscribe all failed");
        }
    }

    /// 发布事件；缺少 id 的错误返回给调用方，其余存储错误记录后忽略
    pub async fn publish(&self, event: NewEvent) -> BusResult<()> {
        let event_type = event.event_type().to_string();

        match self.store.put(event).await {
            Ok(()) => Ok(()),
            Err(BusError::EventIdRequired) => Err(BusError::EventIdRequired),
            Err(error) => {
                tracing::error!(event_type = %event_type, %error, "publish failed");
                Ok(())
            }
        }
    }

    /// 启动调度循环，返回可用于关闭/等待的句柄
    ///
    /// 每次调用都会启动一个独立的循环，调用方应只调用一次。
    pub fn run(self: Arc<Self>) -> BusHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(Self::scheduler_loop(self, token.clone()));

        BusHandle {
            token,
            tasks: vec![task],
        }
    }

    async fn scheduler_loop(self: Arc<Self>, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                result = self.tick() => {
                    if let Err(error) = result {
                        tracing::error!(%error, "scheduler tick failed");
                    }
                }
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// 执行一轮调度：拉取全部订阅者并发执行各自的投递轮次，全部结束后返回
    pub async fn tick(&self) -> BusResult<()> {
        let subscribers = self.store.get_subscribers().await?;
        tracing::debug!(subscribers = subscribers.len(), "scheduler tick");

        stream::iter(subscribers)
            .for_each_concurrent(None, |subscriber| async move {
                self.run_subscriber(&subscriber).await;
            })
            .await;
        Ok(())
    }

    async fn run_subscriber(&self, subscriber: &Subscriber) {
        let Some(actions) = self.actions.get(&subscriber.id).map(|a| a.clone()) else {
            tracing::debug!(
                subscriber_id = %subscriber.id,
                "no action registered in this process, skipping"
            );
            return;
        };

        // 拉取失败不影响本轮的死信检查
        let events = match self.store.find_next_events_for(subscriber).await {
            Ok(events) => events,
            Err(error) => {
                tracing::error!(subscriber_id = %subscriber.id, %error, "find next events failed");
                Vec::new()
            }
        };

        let dead_events = if self.dead_letter_due(subscriber) {
            self.fetch_dead_events(subscriber).await
        } else {
            Vec::new()
        };

        let deliveries = events
            .into_iter()
            .map(Delivery::Pending)
            .chain(dead_events.into_iter().map(Delivery::Dead));

        let actions = &actions;
        stream::iter(deliveries)
            .for_each_concurrent(None, |delivery| async move {
                match delivery {
                    Delivery::Pending(event) => {
                        tracing::info!(
                            event_id = event.id(),
                            event_type = event.event_type(),
                            subscriber_id = %subscriber.id,
                            "delivering event"
                        );
                        self.deliver(subscriber, actions, event).await;
                    }
                    Delivery::Dead(event) => {
                        self.deliver_dead(subscriber, actions.dead_action.as_ref(), event)
                            .await;
                    }
                }
            })
            .await;
    }

    fn dead_letter_due(&self, subscriber: &Subscriber) -> bool {
        self.dead_letters
            .get(&subscriber.id)
            .is_some_and(|s| s.has_dead_events || s.recently_failed(Instant::now()))
    }

    async fn fetch_dead_events(&self, subscriber: &Subscriber) -> Vec<Event> {
        let result = self.store.find_dead_events_for(subscriber).await;

        let now = Instant::now();
        let mut state = self.dead_letters.entry(subscriber.id.clone()).or_default();
        state.checks_due.retain(|due| *due > now);
        match result {
            Ok(events) => {
                state.has_dead_events = !events.is_empty();
                events
            }
            Err(error) => {
                tracing::error!(subscriber_id = %subscriber.id, %error, "find dead events failed");
                Vec::new()
            }
        }
    }

    async fn deliver(&self, subscriber: &Subscriber, actions: &RegisteredActions, event: Event) {
        match invoke(&actions.action, &event).await {
            Ok(()) => {
                if let Err(error) = self.store.mark_as_finished(&event, subscriber).await {
                    tracing::error!(
                        event_id = event.id(),
                        subscriber_id = %subscriber.id,
                        %error,
                        "mark as finished failed"
                    );
                    return;
                }
                tracing::info!(
                    event_id = event.id(),
                    event_type = event.event_type(),
                    subscriber_id = %subscriber.id,
                    "event delivered"
                );
            }
            Err(error) => {
                tracing::error!(
                    event_id = event.id(),
                    subscriber_id = %subscriber.id,
                    error = %format!("{error:#}"),
                    "subscriber action failed"
                );
                if let Err(error) = self.store.mark_as_failed(&event, subscriber).await {
                    tracing::error!(
                        event_id = event.id(),
                        subscriber_id = %subscriber.id,
                        %error,
                        "mark as failed failed"
                    );
                }
                self.schedule_dead_letter_check(subscriber);
            }
        }
    }

    // 死信只投递一次：无论死信动作成败都标记完成；未登记死信动作时直接丢弃
    async fn deliver_dead(
        &self,
        subscriber: &Subscriber,
        dead_action: Option<&Arc<dyn SubscriberAction>>,
        event: Event,
    ) {
        match dead_action {
            Some(dead_action) => match invoke(dead_action, &event).await {
                Ok(()) => tracing::info!(
                    event_id = event.id(),
                    subscriber_id = %subscriber.id,
                    "dead event delivered"
                ),
                Err(error) => tracing::error!(
                    event_id = event.id(),
                    subscriber_id = %subscriber.id,
                    error = %format!("{error:#}"),
                    "dead action failed"
                ),
            },
            None => tracing::error!(
                event_id = event.id(),
                event_type = event.event_type(),
                subscriber_id = %subscriber.id,
                "retries exhausted and no dead action registered, dropping event"
            ),
        }

        if let Err(error) = self.store.mark_as_finished(&event, subscriber).await {
            tracing::error!(
                event_id = event.id(),
                subscriber_id = %subscriber.id,
                %error,
                "mark dead event as finished failed"
            );
        }
    }

    // 到期前不会触发死信检查；检查过后到期项即被清除
    fn schedule_dead_letter_check(&self, subscriber: &Subscriber) {
        let due = Instant::now() + subscriber.config.dead_letter_delay();
        self.dead_letters
            .entry(subscriber.id.clone())
            .or_default()
            .checks_due
            .push(due);
    }
}

async fn invoke(action: &Arc<dyn SubscriberAction>, event: &Event) -> anyhow::Result<()> {
    match AssertUnwindSafe(action.handle(event)).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("subscriber action panicked")),
    }
}

/// 事件总线配置
#[derive(Clone, Copy, Debug)]
pub struct EventBusConfig {
    /// 相邻两轮调度之间的间隔（上一轮结束后开始计时）
    pub poll_interval: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// 调度运行句柄：用于优雅关闭与等待任务结束
pub struct BusHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl BusHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for BusHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
