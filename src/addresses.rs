//! 总线地址与主题定义模块
//!
//! 所有总线绑定、订阅和 broker 主题必须使用此模块中定义的常量，确保一致性。
//! 绑定时使用的地址必须与调用时使用的地址完全一致。

/// 发布服务绑定地址
///
/// 远程调用方通过该地址透明调用 publish 操作
pub const FAVORITES_SERVICE: &str = "kafka.service";

/// 桥接广播地址
///
/// 从 broker 主题转发的每条消息在此地址上做本地扇出
pub const FAVORITES_BROADCAST: &str = "insult.favorites";

/// Broker 主题（消费与生产共用）
pub const FAVORITES_TOPIC: &str = "favorites";

/// 校验总线地址是否有效（非空是唯一的结构性要求）
pub fn validate_address(address: &str) -> bool {
    !address.is_empty()
}
