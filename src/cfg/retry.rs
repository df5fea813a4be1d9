//! 配置读取的重试策略
//!
//! 固定间隔退避，暂时性错误持续重试直到成功，永久性错误立即返回

use backon::{BlockingRetryable, ConstantBuilder};
use garde::Validate;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use std::sync::Arc;
use std::time::Duration;

use super::error::ConfigError;
use super::serde_duration::{format_duration, serde_as, HumanDur};
use crate::log::Logger;

/// 暂时性错误判定函数
pub type TransientFn = Arc<dyn Fn(&ConfigError) -> bool + Send + Sync>;

/// Retry 配置
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, SmartDefault, Validate)]
#[serde(default)]
pub struct RetryConfig {
    /// 两次尝试之间的固定间隔
    #[serde_as(as = "HumanDur")]
    #[default(Duration::from_secs(2))]
    #[garde(skip)]
    pub delay: Duration,

    /// 最大重试次数，None 表示不限次数
    #[garde(range(min = 1))]
    pub max_times: Option<usize>,

    /// 是否在间隔上添加随机抖动
    #[default = false]
    #[garde(skip)]
    pub jitter: bool,
}

impl RetryConfig {
    /// 构建 backon 的固定间隔退避策略
    pub fn backoff(&self) -> ConstantBuilder {
        let mut builder = ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_times.unwrap_or(usize::MAX));

        if self.jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// 按策略执行一次读取操作
///
/// 每次失败都以 info 级别记录；`is_transient` 返回 false 的错误立即返回。
/// 配置了 `max_times` 且次数耗尽时返回 [`ConfigError::RetryExhausted`]
pub fn retry<T, F>(
    config: &RetryConfig,
    is_transient: &(dyn Fn(&ConfigError) -> bool + Send + Sync),
    logger: &Logger,
    mut op: F,
) -> Result<T, ConfigError>
where
    F: FnMut() -> Result<T, ConfigError>,
{
    let mut attempts = 0usize;

    let result = (|| {
        attempts += 1;
        let result = op();
        if let Err(e) = &result {
            logger.info(e);
        }
        result
    })
    .retry(config.backoff())
    .sleep(std::thread::sleep)
    .when(|e| is_transient(e))
    .notify(|e, delay| {
        logger.debug(format!("{} 后重试: {}", format_duration(delay), e));
    })
    .call();

    match result {
        Err(e) if config.max_times.is_some() && is_transient(&e) => {
            Err(ConfigError::RetryExhausted {
                attempts,
                source: Box::new(e),
            })
        }
        other => other,
    }
}
