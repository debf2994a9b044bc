//! Broker 主题到内部总线的桥接
//!
//! 为订阅主题上收到的每条记录解码负载并在总线目标地址上广播。
//! 订阅结果异步上报：订阅失败仅记录日志，不影响已完成的启动；
//! 转发侧的问题同样只记录日志（有意的尽力而为语义）。

use std::time::Duration;

use rdkafka::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::config::ConfigSnapshot;
use crate::error::{BridgeError, Result};

/// 消费出错后的重试间隔
const RECV_RETRY_DELAY: Duration = Duration::from_secs(1);

/// 活跃的 broker 订阅
///
/// 随进程关闭或不可恢复的订阅错误一起销毁。
#[derive(Debug)]
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    /// 驻留在消费循环上直到其退出
    pub async fn join(self) {
        let _ = self.task.await;
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

/// 主题桥接器
pub struct TopicBridge;

impl TopicBridge {
    /// 构建 broker 消费者并开始桥接
    ///
    /// 消费者构建失败是启动阶段错误；订阅请求发出后其结果不再影响启动。
    /// 订阅确认后立刻到达的记录会在消费者队列中等待拉取，不会丢失。
    pub fn start(
        config: &ConfigSnapshot,
        bus: EventBus,
        topic: &str,
        target_address: &str,
    ) -> Result<SubscriptionHandle> {
        let mut client_config = ClientConfig::new();
        for (key, value) in config.broker_properties() {
            client_config.set(key, value);
        }
        let consumer: StreamConsumer = client_config.create().map_err(|err| {
            BridgeError::Config(format!("failed to create Kafka consumer: {err}"))
        })?;

        let topic = topic.to_string();
        let target = target_address.to_string();
        let task = tokio::spawn(async move {
            if let Err(err) = consumer.subscribe(&[topic.as_str()]) {
                let err = BridgeError::Subscription(err.to_string());
                warn!(topic = %topic, error = %err, "Unable to subscribe to topic");
                return;
            }
            info!(topic = %topic, target = %target, "Bridging topic onto the bus");

            loop {
                match consumer.recv().await {
                    Ok(record) => match record.payload() {
                        Some(payload) => forward_payload(&bus, &target, payload).await,
                        None => warn!(topic = %topic, "Received record with empty payload"),
                    },
                    Err(err) => {
                        warn!(topic = %topic, error = %err, "Error receiving from topic");
                        tokio::time::sleep(RECV_RETRY_DELAY).await;
                    }
                }
            }
        });

        Ok(SubscriptionHandle { task })
    }
}

/// 解码一条记录负载并广播到目标地址
///
/// 无法解码的负载记录日志后跳过，不中断消费循环。
async fn forward_payload(bus: &EventBus, target: &str, payload: &[u8]) {
    match serde_json::from_slice::<Value>(payload) {
        Ok(body) => {
            debug!(target = %target, "Forwarding record onto the bus");
            bus.publish(target, body).await;
        }
        Err(err) => {
            warn!(error = %err, "Skipping record with undecodable payload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Fragment;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;
    use toml::Value as TomlValue;

    /// 解码后的负载原样广播到目标地址
    #[tokio::test]
    async fn decoded_payloads_are_broadcast_unmodified() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe("insult.favorites").await;

        forward_payload(&bus, "insult.favorites", br#"{"text":"nice","uuid":"abc"}"#).await;

        assert_eq!(
            receiver.recv().await.unwrap(),
            json!({"text": "nice", "uuid": "abc"})
        );
    }

    /// 无法解码的负载被跳过，不向总线广播任何内容
    #[tokio::test]
    async fn undecodable_payloads_are_skipped() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe("insult.favorites").await;

        forward_payload(&bus, "insult.favorites", b"not-json").await;

        assert!(matches!(receiver.try_recv(), Err(TryRecvError::Empty)));
    }

    /// 无效的 broker 属性导致消费者构建失败（启动阶段错误）
    #[tokio::test]
    async fn consumer_construction_requires_valid_properties() {
        let value: TomlValue = toml::from_str(
            r#"
[kafka]
"definitely.not.a.real.property" = "x"
"#,
        )
        .unwrap();
        let snapshot = ConfigSnapshot::merge(vec![Fragment {
            source: "test".to_string(),
            value,
        }])
        .unwrap();

        let err = TopicBridge::start(&snapshot, EventBus::new(), "favorites", "insult.favorites")
            .unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
