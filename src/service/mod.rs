//! 发布服务契约定义

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

mod kafka;
pub use kafka::KafkaFavoritesService;

/// 发布服务契约
///
/// 通过内部总线代理远程调用，调用方无需与实现同进程。
/// 每次调用恰好产生一次 produce 请求；broker 失败原样上报，
/// 重试策略（如有）由调用方负责。
#[async_trait]
pub trait FavoritesService: Send + Sync {
    /// 发布一条 favorite 消息到 broker
    async fn publish(&self, favorite: Value) -> Result<()>;
}

/// 为消息补齐唯一标识
///
/// 缺失 `uuid` 字段时生成一次；已有的 `uuid` 绝不覆盖（重发保持不变）。
pub fn ensure_uuid(favorite: &mut Value) {
    if let Value::Object(fields) = favorite {
        fields
            .entry("uuid")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// 缺失 uuid 时生成一个非空的 36 字符标识
    #[test]
    fn uuid_attached_when_absent() {
        let mut favorite = json!({"text": "nice"});
        ensure_uuid(&mut favorite);

        let uuid = favorite["uuid"].as_str().unwrap();
        assert_eq!(uuid.len(), 36);
        assert!(Uuid::parse_str(uuid).is_ok());
        assert_eq!(favorite["text"], "nice");
    }

    /// 已有的 uuid 原样保留
    #[test]
    fn existing_uuid_is_preserved() {
        let mut favorite = json!({"text": "nice", "uuid": "keep-me"});
        ensure_uuid(&mut favorite);
        assert_eq!(favorite["uuid"], "keep-me");
    }

    /// 标识只分配一次，重发不变
    #[test]
    fn uuid_assigned_exactly_once_across_resends() {
        let mut favorite = json!({"text": "nice"});
        ensure_uuid(&mut favorite);
        let first = favorite["uuid"].clone();

        ensure_uuid(&mut favorite);
        assert_eq!(favorite["uuid"], first);
    }
}
