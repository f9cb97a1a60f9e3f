//! 事件存储（EventStore）协议
//!
//! 引擎唯一依赖的存储抽象，内存版与远端版均实现该协议：
//! - 按订阅者拉取待投递事件与死信事件；
//! - 订阅关系的增删查；
//! - 投递结果回报（成功/失败）与事件写入。
//!
use crate::{
    error::BusResult as Result,
    event::{Event, NewEvent},
    subscriber::Subscriber,
};
use async_trait::async_trait;

/// 事件存储：负责扇出、重试计数与死信边界
#[async_trait]
pub trait EventStore: Send + Sync {
    /// 拉取订阅者的下一批待投递事件（至多 `concurrency` 条）
    async fn find_next_events_for(&self, subscriber: &Subscriber) -> Result<Vec<Event>>;

    /// 拉取订阅者已超出重试次数的死信事件
    async fn find_dead_events_for(&self, subscriber: &Subscriber) -> Result<Vec<Event>>;

    async fn get_subscribers(&self) -> Result<Vec<Subscriber>>;

    async fn get_subscribers_by_event_type(&self, event_type: &str) -> Result<Vec<Subscriber>>;

    async fn subscribe(&self, event_type: &str, subscriber: &Subscriber) -> Result<()>;

    /// 移除一条订阅关系；只清理该事件类型的在途状态
    async fn unsubscribe(&self, event_type: &str, subscriber_id: &str) -> Result<()>;

    async fn unsubscribe_all(&self) -> Result<()>;

    /// 标记投递失败（增加重试计数，重新入队）
    async fn mark_as_failed(&self, event: &Event, subscriber: &Subscriber) -> Result<()>;

    /// 标记投递成功；对不在途的事件重复调用为空操作
    async fn mark_as_finished(&self, event: &Event, subscriber: &Subscriber) -> Result<()>;

    /// 写入事件并扇出给当前订阅者；无订阅者时为空操作
    async fn put(&self, event: NewEvent) -> Result<()>;
}
