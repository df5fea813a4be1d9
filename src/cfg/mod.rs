//! cfg 模块 - 配置管理
//!
//! 分层配置存储：配置文件、环境变量、命令行参数按优先级合并，
//! 通过 [`Config`] 提供类型化访问，并支持文件变化后热更新

pub mod cast;
pub mod config;
pub mod env;
pub mod error;
pub mod file_source;
pub mod flag;
pub mod retry;
pub mod serde_duration;
pub mod store;

// 重新导出公共 API
pub use config::Config;
pub use error::ConfigError;
pub use flag::Flag;
pub use retry::{RetryConfig, TransientFn};
pub use store::{ChangeCallback, ConfigStore, StoreOptions};
