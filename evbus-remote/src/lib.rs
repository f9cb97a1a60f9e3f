//! 远端事件存储后端
//!
//! 通过 HTTP 协议访问托管事件服务：
//! - `transport`：带认证与瞬时错误重试的 JSON 调用；
//! - `cipher`：可选的负载端到端加密；
//! - `client`：协议映射、空轮询退避与负载编解码；
//! - `batch` / `store`：高频回报合并后实现 `EventStore`。
//!
pub mod batch;
pub mod cipher;
pub mod client;
pub mod protocol;
pub mod store;
pub mod transport;

pub use batch::Batcher;
pub use cipher::{AesGcmCipher, Cipher};
pub use client::{RemoteApi, RemoteClient};
pub use store::RemoteEventStore;
pub use transport::{HttpTransport, RetryPolicy, Transport};
