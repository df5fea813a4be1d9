//! ndau-config - 进程级分层配置加载
//!
//! 从配置文件和环境变量读取配置，合并多个来源，并可监听配置文件热更新。
//!
//! ## 模块
//!
//! - **cfg**: 分层配置存储与类型化访问接口
//! - **fs**: 文件监听
//! - **log**: 配置子系统使用的具名日志器
//!
//! ## 优先级
//!
//! 从高到低：`set` 覆盖 > 显式给出的命令行参数 > `NDAU_*` 环境变量 >
//! 配置文件（后面的文件覆盖前面的） > 命令行参数默认值 > `set_default` 默认值

pub mod cfg;
pub mod fs;
pub mod log;

// 重新导出主要的公共 API
pub use cfg::{Config, ConfigError, ConfigStore, Flag, RetryConfig, StoreOptions};

pub use fs::{FileEvent, FileWatcher, FileWatcherConfig};

pub use log::{LogLevel, Logger};
