//! favorites-bridge 公共库
//!
//! 在 Kafka 主题与进程内事件总线之间桥接 favorite 消息：
//! 消费 broker 主题 `favorites` 并在总线广播地址上做本地扇出，
//! 同时在总线服务地址上暴露可远程调用的发布操作。

pub mod addresses;
pub mod bridge;
pub mod bus;
pub mod config;
pub mod error;
pub mod server;
pub mod service;

pub use addresses::{FAVORITES_BROADCAST, FAVORITES_SERVICE, FAVORITES_TOPIC};
pub use bus::EventBus;
pub use bus::proxy::{FavoritesServiceProxy, ServiceBinder};
pub use config::{ConfigSnapshot, ConfigSource, ConfigSources, resolve};
pub use error::{BridgeError, Result};
pub use server::{BridgeServer, PipelineState};
pub use service::{FavoritesService, KafkaFavoritesService};
