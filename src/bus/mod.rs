//! 进程内事件总线
//!
//! 按逻辑地址做发布/订阅扇出，并为服务代理提供请求/应答绑定注册。
//!
//! - [`EventBus::publish`] 向地址的所有订阅者广播一条消息（即发即忘）。
//! - [`EventBus::subscribe`] 为地址创建新的接收端。
//!
//! 广播通道按地址惰性创建；没有订阅者的地址上的发布被静默丢弃。

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};

use crate::error::{BridgeError, Result};

pub mod proxy;

/// 单个地址广播通道容量
const CHANNEL_CAPACITY: usize = 64;

/// 服务调用请求
///
/// 由代理发送，绑定在地址上的请求循环接收并通过 `reply` 应答
pub struct ServiceRequest {
    /// 请求消息体
    pub body: Value,
    /// 应答通道
    pub reply: oneshot::Sender<Result<Value>>,
}

/// 进程内事件总线句柄（可廉价克隆）
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    /// 地址 -> 广播发送端
    topics: RwLock<HashMap<String, broadcast::Sender<Value>>>,
    /// 地址 -> 服务请求发送端
    bindings: RwLock<HashMap<String, mpsc::Sender<ServiceRequest>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 向地址广播一条消息（即发即忘，不等待确认）
    ///
    /// 地址上没有订阅者时消息被丢弃，发送错误被忽略。
    pub async fn publish(&self, address: &str, body: Value) {
        let topics = self.inner.topics.read().await;
        if let Some(sender) = topics.get(address) {
            let _ = sender.send(body);
        }
    }

    /// 订阅地址，返回新的接收端
    pub async fn subscribe(&self, address: &str) -> broadcast::Receiver<Value> {
        let mut topics = self.inner.topics.write().await;
        topics
            .entry(address.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// 在地址上绑定服务请求通道
    ///
    /// 重复绑定同一地址会替换先前的绑定。
    pub(crate) async fn bind(&self, address: &str, sender: mpsc::Sender<ServiceRequest>) {
        let mut bindings = self.inner.bindings.write().await;
        bindings.insert(address.to_string(), sender);
    }

    /// 查找地址上的服务请求通道
    pub(crate) async fn sender_for(&self, address: &str) -> Result<mpsc::Sender<ServiceRequest>> {
        let bindings = self.inner.bindings.read().await;
        bindings
            .get(address)
            .cloned()
            .ok_or_else(|| BridgeError::Bus(format!("no service bound at address {address}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    /// 发布的消息到达该地址的所有订阅者，且不会串到其他地址
    #[tokio::test]
    async fn publish_reaches_all_subscribers_of_address() {
        let bus = EventBus::new();
        let mut first = bus.subscribe("insult.favorites").await;
        let mut second = bus.subscribe("insult.favorites").await;
        let mut other = bus.subscribe("insult.other").await;

        bus.publish("insult.favorites", json!({"text": "nice"})).await;

        assert_eq!(first.recv().await.unwrap(), json!({"text": "nice"}));
        assert_eq!(second.recv().await.unwrap(), json!({"text": "nice"}));
        assert!(matches!(other.try_recv(), Err(TryRecvError::Empty)));
    }

    /// 没有订阅者的地址上的发布被静默丢弃
    #[tokio::test]
    async fn publish_without_subscribers_is_dropped() {
        let bus = EventBus::new();
        bus.publish("insult.favorites", json!({"text": "nice"})).await;
    }

    /// 未绑定地址上的服务查找失败
    #[tokio::test]
    async fn sender_for_unbound_address_fails() {
        let bus = EventBus::new();
        let err = bus.sender_for("kafka.service").await.unwrap_err();
        assert!(matches!(err, BridgeError::Bus(_)));
    }
}
