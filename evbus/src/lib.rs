//! 事件总线客户端
//!
//! 对外入口：配置、装配与注册表，以及领域类型与两类存储后端的统一导出。
//!
//! ```ignore
//! let bus = evbus::create_in_memory_bus(&InMemoryBusOptions::default());
//! bus.subscribe("user.created", registration).await;
//! let handle = bus.clone().run();
//! bus.publish(event).await?;
//! ```
//!
pub mod config;
pub mod factory;
pub mod logging;
pub mod registry;

pub use config::{InMemoryBusOptions, LogLevel, RemoteBusOptions};
pub use factory::{create_in_memory_bus, create_remote_bus};
pub use registry::{BusRegistry, RemoteBusKey};

pub use evbus_domain::error::{BusError, BusResult};
pub use evbus_domain::event::{Event, NewEvent};
pub use evbus_domain::eventing::{
    BusHandle, EventBus, EventBusConfig, EventStore, InMemoryEventStore, SubscriberAction,
    SubscriberRegistration, action_fn,
};
pub use evbus_domain::subscriber::{Subscriber, SubscriberConfig, SubscriberId};
pub use evbus_remote::RemoteEventStore;
