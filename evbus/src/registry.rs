//! 总线注册表（BusRegistry）
//!
//! 由调用方持有的显式缓存，同一配置只装配一次总线，替代进程级单例。
//! 内存总线全局唯一；远端总线按连接身份（token、base URL、是否加密、passphrase）区分。
//!
use crate::config::{InMemoryBusOptions, RemoteBusOptions};
use crate::factory::{create_in_memory_bus, create_remote_bus};
use dashmap::DashMap;
use evbus_domain::error::BusResult;
use evbus_domain::eventing::EventBus;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteBusKey {
    pub token: String,
    pub base_url: String,
    pub client_encryption: bool,
    pub passphrase: Option<String>,
}

impl From<&RemoteBusOptions> for RemoteBusKey {
    fn from(options: &RemoteBusOptions) -> Self {
        Self {
            token: options.token.clone(),
            base_url: options.base_url.clone(),
            client_encryption: options.client_encryption,
            passphrase: options.passphrase.clone(),
        }
    }
}

#[derive(Default)]
pub struct BusRegistry {
    in_memory: OnceLock<Arc<EventBus>>,
    remote: DashMap<RemoteBusKey, Arc<EventBus>>,
}

impl BusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 首次调用按 `options` 装配，之后返回同一实例（后续选项被忽略）
    pub fn in_memory(&self, options: &InMemoryBusOptions) -> Arc<EventBus> {
        self.in_memory
            .get_or_init(|| create_in_memory_bus(options))
            .clone()
    }

    pub fn remote(&self, options: &RemoteBusOptions) -> BusResult<Arc<EventBus>> {
        let key = RemoteBusKey::from(options);
        if let Some(bus) = self.remote.get(&key) {
            return Ok(bus.clone());
        }

        let bus = create_remote_bus(options)?;
        Ok(self.remote.entry(key).or_insert(bus).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_bus_is_shared() {
        let registry = BusRegistry::new();
        let a = registry.in_memory(&InMemoryBusOptions::default());
        let b = registry.in_memory(&InMemoryBusOptions::default());
        assert!(Arc::ptr_eq(&a, &b));

        let other = BusRegistry::new();
        assert!(!Arc::ptr_eq(&a, &other.in_memory(&InMemoryBusOptions::default())));
    }

    #[test]
    fn remote_buses_are_keyed_by_connection_identity() {
        let registry = BusRegistry::new();
        let opts = RemoteBusOptions::builder()
            .token("t1")
            .passphrase("p")
            .base_url("http://localhost:1/api/v1")
            .build();

        let a = registry.remote(&opts).unwrap();
        let b = registry.remote(&opts.clone()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let mut other = opts.clone();
        other.token = "t2".into();
        let c = registry.remote(&other).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));

        // 轮询间隔不属于连接身份
        let mut slower = opts.clone();
        slower.poll_interval = std::time::Duration::from_secs(5);
        assert!(Arc::ptr_eq(&a, &registry.remote(&slower).unwrap()));
    }

    #[test]
    fn remote_without_token_fails_and_is_not_cached() {
        let registry = BusRegistry::new();
        let opts = RemoteBusOptions::builder()
            .token("")
            .client_encryption(false)
            .build();

        assert!(registry.remote(&opts).is_err());
        assert!(registry.remote.is_empty());
    }
}
