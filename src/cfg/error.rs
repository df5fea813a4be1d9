use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 配置加载统一错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("读取配置文件失败 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("配置文件 \"{name}\" 在目录 {dir} 中不存在")]
    NotFound { name: String, dir: PathBuf },

    #[error("解析 {format} 配置失败 {path}: {message}")]
    Parse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("不支持的配置文件格式: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("初始化日志器失败: {0}")]
    Logger(String),

    #[error("无效的选项: {0}")]
    InvalidOptions(String),

    #[error("启动文件监听失败: {0}")]
    Watch(String),

    #[error("无效的配置键: \"{0}\"")]
    InvalidKey(String),

    #[error("重试 {attempts} 次后仍然失败: {source}")]
    RetryExhausted {
        attempts: usize,
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }

    /// 判断错误是否可能通过等待后重试解决
    ///
    /// 文件暂时缺失、权限或锁竞争视为暂时性错误；
    /// 解析失败、格式不支持以及其他 IO 错误视为永久性错误
    pub fn is_transient(&self) -> bool {
        match self {
            ConfigError::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::NotFound
                    | io::ErrorKind::PermissionDenied
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::TimedOut
            ),
            ConfigError::NotFound { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let missing = ConfigError::io("a.yaml", io::Error::from(io::ErrorKind::NotFound));
        assert!(missing.is_transient());

        let denied = ConfigError::io("a.yaml", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(denied.is_transient());

        let invalid = ConfigError::io("a.yaml", io::Error::from(io::ErrorKind::InvalidData));
        assert!(!invalid.is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        let parse = ConfigError::Parse {
            path: "a.yaml".into(),
            format: "yaml".to_string(),
            message: "bad indent".to_string(),
        };
        assert!(!parse.is_transient());
        assert!(!ConfigError::UnsupportedFormat { path: "a.ini".into() }.is_transient());
        assert!(!ConfigError::Logger("bad level".to_string()).is_transient());
    }

    #[test]
    fn test_not_found_in_dir_is_transient() {
        let err = ConfigError::NotFound {
            name: "app".to_string(),
            dir: "/etc/app".into(),
        };
        assert!(err.is_transient());
        assert!(err.to_string().contains("app"));
    }

    #[test]
    fn test_retry_exhausted_message() {
        let err = ConfigError::RetryExhausted {
            attempts: 3,
            source: Box::new(ConfigError::io(
                "a.yaml",
                io::Error::from(io::ErrorKind::NotFound),
            )),
        };
        assert!(err.to_string().contains('3'));
        assert!(!err.is_transient());
    }
}
