//! 环境变量映射
//!
//! 配置键 `a.b` 对应环境变量 `NDAU_A_B`：点号替换为下划线，加前缀后转为大写

/// 默认环境变量前缀
pub const ENV_PREFIX: &str = "NDAU";
/// 配置日志级别
pub const LOG_LEVEL_ENV: &str = "NDAU_LOG_LEVEL";
/// 未显式传入文件时使用的配置文件名
pub const CONFIG_NAME_ENV: &str = "NDAU_CONFIG_NAME";
/// 未显式传入文件时搜索的目录
pub const CONFIG_PATH_ENV: &str = "NDAU_CONFIG_PATH";

/// 读取环境变量，未设置或为空时返回默认值
pub fn var_or(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

/// 配置键到环境变量名的映射规则
#[derive(Debug, Clone)]
pub struct EnvKeys {
    prefix: String,
}

impl EnvKeys {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('_').to_string(),
        }
    }

    /// 配置键对应的环境变量名
    pub fn env_key(&self, key: &str) -> String {
        let key = key.replace('.', "_");
        if self.prefix.is_empty() {
            key.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, key).to_uppercase()
        }
    }

    /// 查找配置键对应的环境变量值，空值视为未设置
    pub fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(self.env_key(key))
            .ok()
            .filter(|value| !value.is_empty())
    }
}

impl Default for EnvKeys {
    fn default() -> Self {
        Self::new(ENV_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_env_key_mapping() {
        let keys = EnvKeys::default();
        assert_eq!(keys.env_key("db.host"), "NDAU_DB_HOST");
        assert_eq!(keys.env_key("Port"), "NDAU_PORT");
        assert_eq!(keys.env_key("a.b_c.d"), "NDAU_A_B_C_D");
    }

    #[test]
    fn test_env_key_custom_prefix() {
        assert_eq!(EnvKeys::new("app_").env_key("db.host"), "APP_DB_HOST");
        assert_eq!(EnvKeys::new("").env_key("db.host"), "DB_HOST");
    }

    #[test]
    #[serial]
    fn test_lookup_ignores_empty_values() {
        let keys = EnvKeys::new("NDAUENVTEST");
        std::env::set_var("NDAUENVTEST_NAME", "value");
        std::env::set_var("NDAUENVTEST_EMPTY", "");

        assert_eq!(keys.lookup("name"), Some("value".to_string()));
        assert_eq!(keys.lookup("empty"), None);
        assert_eq!(keys.lookup("missing"), None);

        std::env::remove_var("NDAUENVTEST_NAME");
        std::env::remove_var("NDAUENVTEST_EMPTY");
    }

    #[test]
    #[serial]
    fn test_var_or() {
        std::env::remove_var("NDAUENVTEST_LEVEL");
        assert_eq!(var_or("NDAUENVTEST_LEVEL", "info"), "info");

        std::env::set_var("NDAUENVTEST_LEVEL", "debug");
        assert_eq!(var_or("NDAUENVTEST_LEVEL", "info"), "debug");
        std::env::remove_var("NDAUENVTEST_LEVEL");
    }
}
