//! 订阅者动作（SubscriberAction）
//!
//! 定义订阅者消费事件的处理逻辑；闭包可通过 `action_fn` 适配。
//!
use crate::event::Event;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// 订阅者动作：处理一条事件，返回错误即视为投递失败
#[async_trait]
pub trait SubscriberAction: Send + Sync {
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

/// 基于闭包的动作
pub struct FnAction<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> SubscriberAction for FnAction<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        (self.f)(event.clone()).await
    }
}

/// 将异步闭包包装为 `SubscriberAction`
pub fn action_fn<F, Fut>(f: F) -> Arc<dyn SubscriberAction>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnAction { f })
}
