//! 总线装配
//!
//! 按选项组装存储后端与引擎，返回尚未运行的 `EventBus`；调用方自行 `run()`。
//! 装配时按选项中的日志级别安装 tracing 订阅器（已安装则沿用）。
//!
use crate::config::{InMemoryBusOptions, RemoteBusOptions};
use crate::logging::init_tracing;
use evbus_domain::error::BusResult;
use evbus_domain::eventing::{EventBus, EventBusConfig, InMemoryEventStore};
use evbus_remote::{AesGcmCipher, Cipher, HttpTransport, RemoteClient, RemoteEventStore};
use std::sync::Arc;

pub fn create_in_memory_bus(options: &InMemoryBusOptions) -> Arc<EventBus> {
    init_tracing(options.log);

    Arc::new(
        EventBus::builder()
            .store(Arc::new(InMemoryEventStore::new()))
            .config(EventBusConfig {
                poll_interval: options.poll_interval,
            })
            .build(),
    )
}

/// 缺少 token，或启用加密却缺少 passphrase 时返回配置错误
pub fn create_remote_bus(options: &RemoteBusOptions) -> BusResult<Arc<EventBus>> {
    options.validate()?;
    init_tracing(options.log);

    let transport = HttpTransport::new(&options.base_url, &options.token)?;
    let cipher: Option<Arc<dyn Cipher>> = match (&options.passphrase, options.client_encryption) {
        (Some(passphrase), true) => {
            let cipher = AesGcmCipher::from_passphrase(passphrase)?;
            Some(Arc::new(cipher) as Arc<dyn Cipher>)
        }
        _ => None,
    };
    let client = RemoteClient::new(Arc::new(transport), cipher);

    tracing::debug!(
        base_url = %options.base_url,
        client_encryption = options.client_encryption,
        "remote bus assembled"
    );

    Ok(Arc::new(
        EventBus::builder()
            .store(Arc::new(RemoteEventStore::new(Arc::new(client))))
            .config(EventBusConfig {
                poll_interval: options.poll_interval,
            })
            .build(),
    ))
}
