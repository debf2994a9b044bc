//! 启动流水线与桥接服务器
//!
//! 各启动阶段严格顺序执行：配置加载 → 配置合并 → 服务绑定 → 主题桥接。
//! 任一阶段失败直接进入 FAILED 终态，失败原因作为整体启动失败上报；
//! 已完成的阶段不回滚（桥接失败时服务绑定保持有效）。

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::addresses::{FAVORITES_BROADCAST, FAVORITES_SERVICE, FAVORITES_TOPIC};
use crate::bridge::{SubscriptionHandle, TopicBridge};
use crate::bus::EventBus;
use crate::bus::proxy::ServiceBinder;
use crate::config::{ConfigSnapshot, ConfigSources};
use crate::error::Result;
use crate::service::KafkaFavoritesService;

/// 启动流水线状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    /// 未启动
    Idle,
    /// 正在读取各配置源
    ConfigLoading,
    /// 正在折叠配置片段
    ConfigMerging,
    /// 正在绑定发布服务
    ServiceRegistering,
    /// 正在建立主题桥接
    Bridging,
    /// 启动完成（唯一的健康状态）
    Ready,
    /// 启动失败（终态）
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "IDLE",
            PipelineState::ConfigLoading => "CONFIG_LOADING",
            PipelineState::ConfigMerging => "CONFIG_MERGING",
            PipelineState::ServiceRegistering => "SERVICE_REGISTERING",
            PipelineState::Bridging => "BRIDGING",
            PipelineState::Ready => "READY",
            PipelineState::Failed => "FAILED",
        }
    }

    /// 进程是否处于健康状态
    pub fn is_ready(&self) -> bool {
        matches!(self, PipelineState::Ready)
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Ready | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 桥接服务器
///
/// 持有总线和配置快照，驱动启动流水线并驻留在消费循环上。
pub struct BridgeServer {
    sources: ConfigSources,
    bus: EventBus,
    state: PipelineState,
    service_address: String,
    broadcast_address: String,
    topic: String,
    config: Option<ConfigSnapshot>,
    subscription: Option<SubscriptionHandle>,
}

impl BridgeServer {
    pub fn new(sources: ConfigSources) -> Self {
        Self {
            sources,
            bus: EventBus::new(),
            state: PipelineState::Idle,
            service_address: FAVORITES_SERVICE.to_string(),
            broadcast_address: FAVORITES_BROADCAST.to_string(),
            topic: FAVORITES_TOPIC.to_string(),
            config: None,
            subscription: None,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> Option<&ConfigSnapshot> {
        self.config.as_ref()
    }

    /// 依次推进各启动阶段
    pub async fn start(&mut self) -> Result<()> {
        match self.advance().await {
            Ok(()) => {
                self.transition(PipelineState::Ready);
                info!(state = %self.state, "Favorites bridge started");
                Ok(())
            }
            Err(err) => {
                let stage = self.state;
                self.transition(PipelineState::Failed);
                error!(stage = %stage, error = %err, "Startup failed");
                Err(err)
            }
        }
    }

    async fn advance(&mut self) -> Result<()> {
        self.transition(PipelineState::ConfigLoading);
        let fragments = self.sources.load()?;

        self.transition(PipelineState::ConfigMerging);
        let config = ConfigSnapshot::merge(fragments)?;

        self.transition(PipelineState::ServiceRegistering);
        let service = Arc::new(KafkaFavoritesService::new(&config)?);
        ServiceBinder::new(&self.bus)
            .set_address(&self.service_address)
            .register(service)
            .await?;

        self.transition(PipelineState::Bridging);
        let subscription = TopicBridge::start(
            &config,
            self.bus.clone(),
            &self.topic,
            &self.broadcast_address,
        )?;

        self.config = Some(config);
        self.subscription = Some(subscription);
        Ok(())
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "Pipeline state transition");
        self.state = next;
    }

    /// 启动并驻留在消费循环上
    pub async fn run(mut self) -> Result<()> {
        self.start().await?;
        if let Some(subscription) = self.subscription.take() {
            subscription.join().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::proxy::FavoritesServiceProxy;
    use crate::config::ConfigSource;
    use crate::error::BridgeError;
    use serde_json::json;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    const LOCAL_KAFKA: &str = r#"
[kafka]
"bootstrap.servers" = "127.0.0.1:1"
"group.id" = "favorites-bridge-test"
"message.timeout.ms" = "300"
"#;

    fn test_sources(name: &str, body: &str) -> ConfigSources {
        let dir = env::temp_dir().join(format!("favorites-bridge-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("default.toml");
        fs::write(&path, body).unwrap();
        ConfigSources::new(vec![ConfigSource::Default(path)])
    }

    /// 订阅结果不影响启动完成：无 broker 时也能到达 READY
    #[tokio::test]
    async fn startup_reaches_ready_without_broker() {
        let mut server = BridgeServer::new(test_sources("ready", LOCAL_KAFKA));

        server.start().await.unwrap();

        assert!(server.state().is_ready());
        assert!(server.config().is_some());
    }

    /// 必需配置源缺失时启动失败并进入 FAILED 终态
    #[tokio::test]
    async fn missing_default_config_fails_startup() {
        let sources = ConfigSources::new(vec![ConfigSource::Default(PathBuf::from(
            "/no/such/favorites-bridge/default.toml",
        ))]);
        let mut server = BridgeServer::new(sources);

        let err = server.start().await.unwrap_err();

        assert!(matches!(err, BridgeError::Config(_)));
        assert_eq!(server.state(), PipelineState::Failed);
        assert!(server.state().is_terminal());
    }

    /// 服务绑定失败时启动失败，失败原因为注册错误
    #[tokio::test]
    async fn registration_failure_fails_startup() {
        let mut server = BridgeServer::new(test_sources("reg-fail", LOCAL_KAFKA));
        server.service_address = String::new();

        let err = server.start().await.unwrap_err();

        assert!(matches!(err, BridgeError::Registration(_)));
        assert_eq!(server.state(), PipelineState::Failed);
    }

    /// 通过总线代理调用已注册服务，broker 失败同步上报给调用方
    #[tokio::test]
    async fn proxy_publish_surfaces_produce_failure() {
        let mut server = BridgeServer::new(test_sources("proxy-produce", LOCAL_KAFKA));
        server.start().await.unwrap();

        let proxy = FavoritesServiceProxy::new(server.bus(), FAVORITES_SERVICE);
        let err = proxy.publish(json!({"text": "nice"})).await.unwrap_err();

        assert!(matches!(err, BridgeError::Produce { .. }));
    }

    #[test]
    fn pipeline_state_reports_health() {
        assert_eq!(PipelineState::Ready.as_str(), "READY");
        assert!(PipelineState::Ready.is_ready());
        assert!(PipelineState::Ready.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Bridging.is_terminal());
        assert!(!PipelineState::Idle.is_ready());
    }
}
