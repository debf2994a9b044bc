//! 桥接服务统一错误类型定义

use thiserror::Error;

/// 桥接服务错误类型
///
/// 启动阶段错误（Config / Registration）中止启动并上报给进程监督者；
/// 稳态错误（Subscription / Produce）只影响其所属的订阅或请求。
#[derive(Debug, Error)]
pub enum BridgeError {
    /// 配置错误（必需配置源不可加载等）
    #[error("Configuration error: {0}")]
    Config(String),

    /// 服务绑定失败
    #[error("Service registration error: {0}")]
    Registration(String),

    /// Broker 订阅失败（仅记录日志，不影响已完成的启动）
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Broker 写入失败（作为操作结果同步上报给调用方）
    #[error("Produce error on topic {topic}: {source}")]
    Produce {
        topic: String,
        #[source]
        source: rdkafka::error::KafkaError,
    },

    /// 总线调用失败（地址未绑定、应答丢失等）
    #[error("Bus error: {0}")]
    Bus(String),
}

/// 桥接服务结果类型
pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<anyhow::Error> for BridgeError {
    fn from(err: anyhow::Error) -> Self {
        BridgeError::Config(format!("{err:#}"))
    }
}
