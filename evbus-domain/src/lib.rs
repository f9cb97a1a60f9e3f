//! 事件总线核心库（evbus-domain）
//!
//! 提供事件分发引擎与存储协议，用于在应用中实现：
//! - 事件与订阅者模型（`event`、`subscriber`）
//! - 存储协议与内存实现（`eventing::store`、`eventing::store_inmemory`）
//! - 调度引擎（`eventing::engine`）：拉取、并发投递、失败重试与死信回收
//!
//! 本 crate 不绑定具体传输实现，远端存储（HTTP 协议、批量合并、退避轮询）
//! 由 `evbus-remote` 提供，二者均实现 `EventStore`，可互换注入引擎。
//!
//! 典型用法：
//! 1. 选择存储后端（`InMemoryEventStore` 或远端存储）；
//! 2. 通过 `EventBus::builder()` 构建引擎并注册订阅者动作；
//! 3. 调用 `EventBus::run` 启动调度循环，使用 `publish` 发布事件。
//!
pub mod error;
pub mod event;
pub mod eventing;
pub mod subscriber;
