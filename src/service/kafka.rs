//! Kafka 发布服务实现

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde_json::Value;
use tracing::{debug, info};

use crate::addresses::FAVORITES_TOPIC;
use crate::config::ConfigSnapshot;
use crate::error::{BridgeError, Result};
use crate::service::{FavoritesService, ensure_uuid};

/// 默认生产等待超时（毫秒），配置未给出 `kafka.message.timeout.ms` 时使用
const DEFAULT_SEND_TIMEOUT_MS: u64 = 5000;

/// Kafka 发布服务
///
/// 独占持有生产者句柄，仅在自身的请求流上访问。
pub struct KafkaFavoritesService {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl KafkaFavoritesService {
    /// 从配置快照的 broker 属性构建生产者
    pub fn new(config: &ConfigSnapshot) -> Result<Self> {
        let mut client_config = ClientConfig::new();
        for (key, value) in config.broker_properties() {
            client_config.set(key, value);
        }

        let producer: FutureProducer = client_config.create().map_err(|err| {
            BridgeError::Config(format!("failed to create Kafka producer: {err}"))
        })?;

        let send_timeout = config
            .get("kafka.message.timeout.ms")
            .and_then(|value| value.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS));

        Ok(Self {
            producer,
            send_timeout,
        })
    }
}

#[async_trait]
impl FavoritesService for KafkaFavoritesService {
    async fn publish(&self, mut favorite: Value) -> Result<()> {
        info!(favorite = %favorite, "Received favorite message");

        ensure_uuid(&mut favorite);
        let key = favorite
            .get("uuid")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let payload = favorite.to_string();

        let record = FutureRecord::to(FAVORITES_TOPIC).key(&key).payload(&payload);
        self.producer
            .send(record, self.send_timeout)
            .await
            .map_err(|(err, _)| BridgeError::Produce {
                topic: FAVORITES_TOPIC.to_string(),
                source: err,
            })?;

        debug!(topic = FAVORITES_TOPIC, "Favorite message produced");
        Ok(())
    }
}
