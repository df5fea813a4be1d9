use crate::log::level::LogLevel;
use anyhow::{anyhow, Result};
use std::fmt::Display;
use std::sync::Arc;
use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;

/// 具名日志器
///
/// 每个 Logger 持有独立的 tracing dispatcher，级别过滤只作用于自身，
/// 不会安装或修改进程级的全局 subscriber
///
/// # 示例
/// ```no_run
/// use ndau_config::log::Logger;
///
/// let logger = Logger::new("config", "info").unwrap();
/// logger.info("config loaded");
/// logger.debug("not printed at info level");
/// ```
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    level: LogLevel,
    dispatch: Dispatch,
}

impl Logger {
    /// 创建输出到 stderr 的日志器
    ///
    /// # 参数
    /// - `name`: 日志器名称，作为 `logger` 字段附加在每条日志上
    /// - `level`: 日志级别字符串（trace/debug/info/warn/error）
    ///
    /// # 错误
    /// 级别字符串无法解析时返回错误
    pub fn new(name: &str, level: &str) -> Result<Self> {
        Self::with_writer(name, level, std::io::stderr)
    }

    /// 使用自定义输出创建日志器
    pub fn with_writer<W>(name: &str, level: &str, writer: W) -> Result<Self>
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        let level = level
            .parse::<LogLevel>()
            .map_err(|e| anyhow!("初始化日志器 {} 失败: {}", name, e))?;

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level.as_level_filter())
            .with_ansi(false)
            .with_writer(writer)
            .finish();

        Ok(Self {
            name: Arc::from(name),
            level,
            dispatch: Dispatch::new(subscriber),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn debug(&self, message: impl Display) {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: impl Display) {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: impl Display) {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: impl Display) {
        self.log(LogLevel::Error, message)
    }

    /// 按指定级别输出一条日志
    pub fn log(&self, level: LogLevel, message: impl Display) {
        if level < self.level {
            return;
        }

        let name = &*self.name;
        tracing::dispatcher::with_default(&self.dispatch, || match level {
            LogLevel::Trace => tracing::trace!(logger = name, "{}", message),
            LogLevel::Debug => tracing::debug!(logger = name, "{}", message),
            LogLevel::Info => tracing::info!(logger = name, "{}", message),
            LogLevel::Warn => tracing::warn!(logger = name, "{}", message),
            LogLevel::Error => tracing::error!(logger = name, "{}", message),
        });
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// 收集日志输出的测试 writer
    #[derive(Clone, Default)]
    pub(crate) struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

    impl CapturedOutput {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    impl Write for CapturedOutput {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn captured_logger(level: &str) -> (Logger, CapturedOutput) {
        let output = CapturedOutput::default();
        let writer = output.clone();
        let logger = Logger::with_writer("config", level, move || writer.clone()).unwrap();
        (logger, output)
    }

    #[test]
    fn test_logger_new() {
        let logger = Logger::new("config", "info").unwrap();
        assert_eq!(logger.name(), "config");
        assert_eq!(logger.level(), LogLevel::Info);
    }

    #[test]
    fn test_logger_invalid_level() {
        let result = Logger::new("config", "verbose");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("verbose"));
    }

    #[test]
    fn test_logger_respects_level() {
        let (logger, output) = captured_logger("warn");

        logger.info("hidden message");
        logger.warn("visible warning");
        logger.error("visible error");

        let contents = output.contents();
        assert!(!contents.contains("hidden message"));
        assert!(contents.contains("visible warning"));
        assert!(contents.contains("visible error"));
        assert!(contents.contains("config"));
    }

    #[test]
    fn test_logger_debug_level() {
        let (logger, output) = captured_logger("debug");

        logger.debug("debug details");
        logger.log(LogLevel::Trace, "trace details");

        let contents = output.contents();
        assert!(contents.contains("debug details"));
        assert!(!contents.contains("trace details"));
    }
}
