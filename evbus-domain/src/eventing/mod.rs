//! 事件分发子系统（eventing）
//!
//! 提供事件存储协议、内存实现与调度引擎：
//! - `EventStore`：引擎唯一依赖的存储协议（拉取、订阅管理、结果回报、写入）；
//! - `InMemoryEventStore`：进程内队列 + 重试计数 + 死信队列；
//! - `SubscriberAction`：订阅者在进程内的处理逻辑；
//! - `EventBus`：调度循环、并发投递、失败重试与死信回收。
//!
//! 远端存储由 `evbus-remote` 提供，同样实现 `EventStore`。
//!
pub mod action;
pub mod engine;
pub mod store;
pub mod store_inmemory;

pub use action::{FnAction, SubscriberAction, action_fn};
pub use engine::{BusHandle, EventBus, EventBusConfig, SubscriberRegistration};
pub use store::EventStore;
pub use store_inmemory::InMemoryEventStore;
