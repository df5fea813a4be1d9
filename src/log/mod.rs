//! 日志模块
//!
//! 提供配置子系统使用的具名日志器，底层输出基于 tracing。
//!
//! # 特性
//!
//! - 日志级别：Trace, Debug, Info, Warn, Error
//! - 每个 Logger 拥有独立的级别过滤，不依赖全局 subscriber
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use ndau_config::log::Logger;
//!
//! let logger = Logger::new("config", "info").unwrap();
//! logger.info("Application started");
//! logger.error("Connection failed");
//! ```

pub mod level;
pub mod logger;

pub use level::LogLevel;
pub use logger::Logger;
