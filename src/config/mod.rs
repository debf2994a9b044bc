//! favorites-bridge 配置模块
//!
//! 该模块提供分层配置解析功能，包括：
//! - 固定优先级顺序的配置源清单
//! - 各源 TOML 片段的加载
//! - 片段按顺序折叠为点分键的只读快照
//!
//! 源按固定顺序折叠，后面的源覆盖前面的同名键；缺失的可选源静默跳过，
//! 缺失的必需默认源为致命错误。标量值统一转为字符串后交给 broker 客户端
//! （broker 客户端要求属性为字符串类型）。

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result as AnyResult};
use toml::Value;
use tracing::{debug, warn};

use crate::error::Result;

/// 内置默认配置文件路径（必需）
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 本地覆盖配置文件固定路径（可选）
pub const LOCAL_OVERRIDE_PATH: &str = "/opt/favorites-bridge/config.toml";

/// 集群 ConfigMap 挂载文件固定路径（可选）
pub const CONFIG_MAP_PATH: &str = "/etc/favorites-bridge/kafka-config.toml";

/// 集群部署环境标记变量
///
/// 仅当该变量存在时才读取 ConfigMap 源
pub const CLUSTER_MARKER_ENV: &str = "KUBERNETES_NAMESPACE";

/// 进程级属性覆盖前缀
///
/// `FAVORITES_BRIDGE_KAFKA_BOOTSTRAP_SERVERS=x` 覆盖键 `kafka.bootstrap.servers`
pub const ENV_PREFIX: &str = "FAVORITES_BRIDGE_";

/// Broker 客户端属性所在的键前缀
const BROKER_KEY_PREFIX: &str = "kafka.";

/// 单个配置源
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// 内置默认配置文件（必需，不可读取为致命错误）
    Default(PathBuf),
    /// 本地覆盖文件（可选，缺失时静默跳过）
    LocalFile(PathBuf),
    /// 集群 ConfigMap 挂载文件（可选，仅在部署环境标记存在时读取）
    ConfigMap { path: PathBuf, marker: String },
    /// 进程环境属性（可选，优先级最高）
    EnvProperties { prefix: String },
}

/// 已加载的单个配置片段
#[derive(Debug, Clone)]
pub struct Fragment {
    /// 来源名（用于日志）
    pub source: String,
    /// 原始 TOML 值
    pub value: Value,
}

/// 配置源清单（有序，按声明顺序折叠）
#[derive(Debug, Clone)]
pub struct ConfigSources {
    sources: Vec<ConfigSource>,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self::new(vec![
            ConfigSource::Default(PathBuf::from(DEFAULT_CONFIG_PATH)),
            ConfigSource::LocalFile(PathBuf::from(LOCAL_OVERRIDE_PATH)),
            ConfigSource::ConfigMap {
                path: PathBuf::from(CONFIG_MAP_PATH),
                marker: CLUSTER_MARKER_ENV.to_string(),
            },
            ConfigSource::EnvProperties {
                prefix: ENV_PREFIX.to_string(),
            },
        ])
    }
}

impl ConfigSources {
    pub fn new(sources: Vec<ConfigSource>) -> Self {
        Self { sources }
    }

    /// 读取所有当前存在的配置源
    ///
    /// 可选源不可解析时记录日志并跳过；必需默认源不可读取时返回错误。
    pub fn load(&self) -> Result<Vec<Fragment>> {
        let mut fragments = Vec::new();

        for source in &self.sources {
            match source {
                ConfigSource::Default(path) => {
                    let value = load_toml_file(path)
                        .context("required default configuration source")?;
                    fragments.push(Fragment {
                        source: "default".to_string(),
                        value,
                    });
                }
                ConfigSource::LocalFile(path) => {
                    if !path.exists() {
                        continue;
                    }
                    match load_toml_file(path) {
                        Ok(value) => fragments.push(Fragment {
                            source: "local-override".to_string(),
                            value,
                        }),
                        Err(err) => {
                            warn!("failed to load config from {}: {err:#}", path.display());
                        }
                    }
                }
                ConfigSource::ConfigMap { path, marker } => {
                    // 仅在集群部署标记存在时读取
                    if env::var_os(marker).is_none() {
                        continue;
                    }
                    if !path.exists() {
                        continue;
                    }
                    match load_toml_file(path) {
                        Ok(value) => fragments.push(Fragment {
                            source: "configmap".to_string(),
                            value,
                        }),
                        Err(err) => {
                            warn!("failed to load config from {}: {err:#}", path.display());
                        }
                    }
                }
                ConfigSource::EnvProperties { prefix } => {
                    if let Some(value) = env_fragment(prefix) {
                        fragments.push(Fragment {
                            source: "env".to_string(),
                            value,
                        });
                    }
                }
            }
        }

        Ok(fragments)
    }
}

/// 合并后的只读配置快照
///
/// 启动时构建一次，此后只读，由流水线持有并传递给依赖组件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    entries: BTreeMap<String, String>,
}

impl ConfigSnapshot {
    /// 将各配置源片段按顺序折叠为一个只读快照
    ///
    /// 每个片段先展平为点分键的部分映射，后面的片段覆盖同名键。
    pub fn merge(fragments: Vec<Fragment>) -> Result<Self> {
        let mut entries = BTreeMap::new();

        for fragment in fragments {
            let mut partial = BTreeMap::new();
            flatten_value("", &fragment.value, &mut partial);
            debug!(
                source = %fragment.source,
                keys = partial.len(),
                "Merging configuration source"
            );
            entries.extend(partial);
        }

        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Broker 客户端属性
    ///
    /// `kafka.` 前缀下的条目，前缀剥除后交给客户端构建器
    pub fn broker_properties(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(BROKER_KEY_PREFIX)
                    .map(|name| (name.to_string(), value.clone()))
            })
            .collect()
    }
}

/// 解析完整配置：加载所有存在的源并折叠为只读快照
///
/// 对相同的源集合重复解析产生相同的快照。
pub fn resolve(sources: &ConfigSources) -> Result<ConfigSnapshot> {
    let fragments = sources.load()?;
    ConfigSnapshot::merge(fragments)
}

/// 加载单个 TOML 配置文件
fn load_toml_file(path: &Path) -> AnyResult<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file {}", path.display()))?;
    let value: Value = toml::from_str(&content)
        .with_context(|| format!("invalid TOML content in {}", path.display()))?;
    Ok(value)
}

/// 收集带前缀的环境变量为一个平铺片段
///
/// `<PREFIX>KAFKA_BOOTSTRAP_SERVERS` 映射为键 `kafka.bootstrap.servers`
fn env_fragment(prefix: &str) -> Option<Value> {
    let mut table = toml::Table::new();
    for (key, value) in env::vars() {
        if let Some(rest) = key.strip_prefix(prefix) {
            if rest.is_empty() {
                continue;
            }
            let dotted = rest.to_ascii_lowercase().replace('_', ".");
            table.insert(dotted, Value::String(value));
        }
    }

    if table.is_empty() {
        None
    } else {
        Some(Value::Table(table))
    }
}

/// 递归展平 TOML 表为点分键，标量叶子统一转为字符串
fn flatten_value(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Table(table) => {
            for (key, child) in table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_value(&path, child, out);
            }
        }
        Value::String(text) => {
            out.insert(prefix.to_string(), text.clone());
        }
        Value::Integer(number) => {
            out.insert(prefix.to_string(), number.to_string());
        }
        Value::Float(number) => {
            out.insert(prefix.to_string(), number.to_string());
        }
        Value::Boolean(flag) => {
            out.insert(prefix.to_string(), flag.to_string());
        }
        Value::Datetime(stamp) => {
            out.insert(prefix.to_string(), stamp.to_string());
        }
        Value::Array(_) => {
            warn!(key = %prefix, "Array values are not supported in configuration, skipping");
        }
    }
}
