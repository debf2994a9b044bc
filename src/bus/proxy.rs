//! 总线服务绑定与调用代理
//!
//! 将 [`FavoritesService`] 实现绑定到总线地址上；任何持有
//! [`FavoritesServiceProxy`] 的调用方都可以透明调用 publish，
//! 无需与实现共享进程或持有实现引用。

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::addresses::validate_address;
use crate::bus::{EventBus, ServiceRequest};
use crate::error::{BridgeError, Result};
use crate::service::FavoritesService;

/// 请求通道容量
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// 服务绑定器
///
/// 启动期绑定一次，先于桥接订阅；重复绑定同一地址会替换先前的绑定。
pub struct ServiceBinder {
    bus: EventBus,
    address: Option<String>,
}

impl ServiceBinder {
    pub fn new(bus: &EventBus) -> Self {
        Self {
            bus: bus.clone(),
            address: None,
        }
    }

    /// 设置绑定地址
    pub fn set_address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }

    /// 将服务实现绑定到地址
    ///
    /// 绑定后在后台循环接收请求并调用 `service.publish` 应答。
    pub async fn register(self, service: Arc<dyn FavoritesService>) -> Result<()> {
        let address = self.address.unwrap_or_default();
        if !validate_address(&address) {
            return Err(BridgeError::Registration(
                "service address must not be empty".to_string(),
            ));
        }

        let (sender, mut receiver) = mpsc::channel::<ServiceRequest>(REQUEST_CHANNEL_CAPACITY);
        self.bus.bind(&address, sender).await;

        let loop_address = address.clone();
        tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let outcome = service.publish(request.body).await.map(|_| Value::Null);
                if request.reply.send(outcome).is_err() {
                    debug!(address = %loop_address, "service caller dropped before reply");
                }
            }
            // 绑定被替换后发送端关闭，请求循环退出
            debug!(address = %loop_address, "service request loop stopped");
        });

        info!(address = %address, "Favorites service bound");
        Ok(())
    }
}

/// 发布服务调用代理
///
/// 调用方侧句柄，仅持有总线引用和目标地址。
#[derive(Clone)]
pub struct FavoritesServiceProxy {
    bus: EventBus,
    address: String,
}

impl FavoritesServiceProxy {
    pub fn new(bus: &EventBus, address: &str) -> Self {
        Self {
            bus: bus.clone(),
            address: address.to_string(),
        }
    }

    /// 通过总线调用绑定在地址上的 publish 操作
    pub async fn publish(&self, favorite: Value) -> Result<()> {
        let sender = self.bus.sender_for(&self.address).await?;
        let (reply_sender, reply_receiver) = oneshot::channel();

        sender
            .send(ServiceRequest {
                body: favorite,
                reply: reply_sender,
            })
            .await
            .map_err(|_| BridgeError::Bus(format!("service at {} is gone", self.address)))?;

        reply_receiver
            .await
            .map_err(|_| BridgeError::Bus(format!("no reply from service at {}", self.address)))?
            .map(|_| ())
    }
}

#[async_trait::async_trait]
impl FavoritesService for FavoritesServiceProxy {
    async fn publish(&self, favorite: Value) -> Result<()> {
        FavoritesServiceProxy::publish(self, favorite).await
    }
}
