//! 订阅者模型（Subscriber）
//!
//! 订阅者只描述“投递给谁、如何重试”，不包含处理逻辑；
//! 处理逻辑（action）由引擎在进程内按订阅者 id 持有。
//!
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub type SubscriberId = String;

/// 订阅者投递配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberConfig {
    /// 正常投递的最大尝试次数，达到后事件只能经死信查询取得
    pub max_retries: u32,
    /// 失败后多少秒允许检查死信（秒）
    pub timeout: u64,
    /// 每轮调度最多拉取的待投递事件数
    pub concurrency: usize,
}

impl SubscriberConfig {
    pub fn dead_letter_delay(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: 10,
            concurrency: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub config: SubscriberConfig,
}

impl Subscriber {
    pub fn new(id: impl Into<SubscriberId>, config: SubscriberConfig) -> Self {
        Self {
            id: id.into(),
            config,
        }
    }
}
