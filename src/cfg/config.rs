//! 配置访问接口
//!
//! 宿主程序只通过 [`Config`] 读取配置。所有类型化访问器都基于 [`Config::get`]
//! 做尽力转换，键不存在或无法转换时返回该类型的零值

use chrono::{DateTime, Utc};
use clap::ArgMatches;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::time::Duration;

use super::cast;
use super::error::ConfigError;
use super::flag::Flag;

/// 类型化的键值配置访问接口
///
/// # 示例
/// ```no_run
/// use ndau_config::cfg::{Config, ConfigStore};
///
/// let config = ConfigStore::new(&["base.yaml", "override.yaml"]).unwrap();
///
/// let host = config.get_string("db.host");
/// let timeout = config.get_duration("db.timeout");
/// if !config.is_set("db.port") {
///     println!("db.port 未配置");
/// }
/// ```
pub trait Config: Send + Sync {
    /// 按优先级解析键对应的原始值，不存在时返回 None
    fn get(&self, key: &str) -> Option<JsonValue>;

    /// 所有已知键按优先级解析后的嵌套映射
    fn all_settings(&self) -> Map<String, JsonValue>;

    /// 将命令行参数绑定到配置键
    fn bind_flag(&self, key: &str, flag: Flag) -> Result<(), ConfigError>;

    /// 将解析结果中的所有参数按其 id 绑定
    fn bind_flags(&self, matches: &ArgMatches) -> Result<(), ConfigError>;

    /// 键是否在任一层（覆盖、参数、环境变量、文件、默认值）中存在
    fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn get_bool(&self, key: &str) -> bool {
        self.get(key).as_ref().and_then(cast::to_bool).unwrap_or_default()
    }

    fn get_string(&self, key: &str) -> String {
        self.get(key).as_ref().and_then(cast::to_string).unwrap_or_default()
    }

    fn get_int(&self, key: &str) -> isize {
        self.get(key)
            .as_ref()
            .and_then(cast::to_i64)
            .and_then(|v| isize::try_from(v).ok())
            .unwrap_or_default()
    }

    fn get_int32(&self, key: &str) -> i32 {
        self.get(key)
            .as_ref()
            .and_then(cast::to_i64)
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or_default()
    }

    fn get_int64(&self, key: &str) -> i64 {
        self.get(key).as_ref().and_then(cast::to_i64).unwrap_or_default()
    }

    fn get_uint(&self, key: &str) -> usize {
        self.get(key)
            .as_ref()
            .and_then(cast::to_u64)
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or_default()
    }

    fn get_uint32(&self, key: &str) -> u32 {
        self.get(key)
            .as_ref()
            .and_then(cast::to_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or_default()
    }

    fn get_uint64(&self, key: &str) -> u64 {
        self.get(key).as_ref().and_then(cast::to_u64).unwrap_or_default()
    }

    fn get_float64(&self, key: &str) -> f64 {
        self.get(key).as_ref().and_then(cast::to_f64).unwrap_or_default()
    }

    fn get_duration(&self, key: &str) -> Duration {
        self.get(key).as_ref().and_then(cast::to_duration).unwrap_or_default()
    }

    /// "512kb"、"10 MB" 形式的大小，单位为 1024 的幂
    fn get_size_in_bytes(&self, key: &str) -> u64 {
        self.get(key)
            .as_ref()
            .and_then(cast::to_string)
            .map(|size| cast::parse_size_in_bytes(&size))
            .unwrap_or_default()
    }

    fn get_time(&self, key: &str) -> DateTime<Utc> {
        self.get(key)
            .as_ref()
            .and_then(cast::to_time)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    fn get_int_slice(&self, key: &str) -> Vec<isize> {
        self.get(key)
            .as_ref()
            .and_then(cast::to_int_slice)
            .and_then(|items| {
                items
                    .into_iter()
                    .map(|v| isize::try_from(v).ok())
                    .collect::<Option<Vec<_>>>()
            })
            .unwrap_or_default()
    }

    fn get_string_slice(&self, key: &str) -> Vec<String> {
        self.get(key).as_ref().and_then(cast::to_string_slice).unwrap_or_default()
    }

    fn get_string_map(&self, key: &str) -> Map<String, JsonValue> {
        self.get(key).as_ref().and_then(cast::to_string_map).unwrap_or_default()
    }

    fn get_string_map_string(&self, key: &str) -> HashMap<String, String> {
        self.get(key)
            .as_ref()
            .and_then(cast::to_string_map_string)
            .unwrap_or_default()
    }

    fn get_string_map_string_slice(&self, key: &str) -> HashMap<String, Vec<String>> {
        self.get(key)
            .as_ref()
            .and_then(cast::to_string_map_string_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// 只包含一个固定映射的最小实现
    struct StaticConfig(JsonValue);

    impl Config for StaticConfig {
        fn get(&self, key: &str) -> Option<JsonValue> {
            key.split('.')
                .try_fold(&self.0, |node, part| node.get(part))
                .cloned()
        }

        fn all_settings(&self) -> Map<String, JsonValue> {
            self.0.as_object().cloned().unwrap_or_default()
        }

        fn bind_flag(&self, key: &str, _flag: Flag) -> Result<(), ConfigError> {
            Err(ConfigError::InvalidKey(key.to_string()))
        }

        fn bind_flags(&self, _matches: &ArgMatches) -> Result<(), ConfigError> {
            Ok(())
        }
    }

    fn fixture() -> StaticConfig {
        StaticConfig(json!({
            "enabled": "true",
            "port": "26657",
            "big": 5_000_000_000i64,
            "negative": -4,
            "ratio": 0.75,
            "timeout": "1m30s",
            "cache": "64mb",
            "started": "2024-01-02T03:04:05Z",
            "peers": ["a", "b"],
            "ids": [1, 2, 3],
            "labels": {"zone": "us", "tier": 2},
            "groups": {"admins": ["alice"], "owner": "bob"}
        }))
    }

    #[test]
    fn test_scalar_accessors() {
        let config = fixture();

        assert!(config.get_bool("enabled"));
        assert_eq!(config.get_int("port"), 26657);
        assert_eq!(config.get_int32("port"), 26657);
        assert_eq!(config.get_int64("big"), 5_000_000_000);
        assert_eq!(config.get_int32("big"), 0);
        assert_eq!(config.get_uint("negative"), 0);
        assert_eq!(config.get_uint32("port"), 26657);
        assert_eq!(config.get_uint64("big"), 5_000_000_000);
        assert_eq!(config.get_float64("ratio"), 0.75);
        assert_eq!(config.get_string("port"), "26657");
        assert_eq!(config.get_string("ratio"), "0.75");
    }

    #[test]
    fn test_duration_size_time() {
        let config = fixture();

        assert_eq!(config.get_duration("timeout"), Duration::from_secs(90));
        assert_eq!(config.get_size_in_bytes("cache"), 64 * 1024 * 1024);
        assert_eq!(config.get_time("started").to_rfc3339(), "2024-01-02T03:04:05+00:00");
    }

    #[test]
    fn test_collection_accessors() {
        let config = fixture();

        assert_eq!(config.get_string_slice("peers"), vec!["a", "b"]);
        assert_eq!(config.get_int_slice("ids"), vec![1, 2, 3]);
        assert_eq!(config.get_string_map("labels")["zone"], json!("us"));
        assert_eq!(config.get_string_map_string("labels")["tier"], "2");

        let groups = config.get_string_map_string_slice("groups");
        assert_eq!(groups["admins"], vec!["alice".to_string()]);
        assert_eq!(groups["owner"], vec!["bob".to_string()]);
    }

    #[test]
    fn test_missing_keys_return_zero_values() {
        let config = fixture();

        assert!(!config.is_set("missing"));
        assert_eq!(config.get("missing"), None);
        assert_eq!(config.get_string("missing"), "");
        assert!(!config.get_bool("missing"));
        assert_eq!(config.get_int("missing"), 0);
        assert_eq!(config.get_float64("missing"), 0.0);
        assert_eq!(config.get_duration("missing"), Duration::ZERO);
        assert_eq!(config.get_size_in_bytes("missing"), 0);
        assert_eq!(config.get_time("missing"), DateTime::<Utc>::UNIX_EPOCH);
        assert!(config.get_string_slice("missing").is_empty());
        assert!(config.get_int_slice("missing").is_empty());
        assert!(config.get_string_map("missing").is_empty());
        assert!(config.get_string_map_string("missing").is_empty());
        assert!(config.get_string_map_string_slice("missing").is_empty());
    }

    #[test]
    fn test_unconvertible_values_return_zero_values() {
        let config = fixture();

        assert_eq!(config.get_int("peers"), 0);
        assert_eq!(config.get_string("labels"), "");
        assert!(!config.get_bool("timeout"));
        assert_eq!(config.get_duration("peers"), Duration::ZERO);
        assert!(config.get_string_map("port").is_empty());
        // 存在但无法转换时 is_set 仍为 true
        assert!(config.is_set("peers"));
    }
}
