//! 更新错误与重试策略
//!
//! 提供统一的错误分类和指数退避重试策略

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::task::TaskKind;

/// 更新错误
#[derive(Debug, Error)]
pub enum UpdateError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 提交任务缺少必需参数
    #[error("任务 {kind} 缺少参数: {param}")]
    MissingParam { kind: TaskKind, param: &'static str },

    /// 网络错误
    #[error("网络错误: {0}")]
    Network(String),

    /// 数据获取超时
    #[error("数据获取超时: {0}")]
    Timeout(String),

    /// 请求被限流
    #[error("请求被限流: {0}")]
    RateLimited(String),

    /// 返回数据为空
    #[error("返回数据为空: {0}")]
    EmptyPayload(String),

    /// 返回数据标签与任务类型不符
    #[error("返回数据格式不符: 期望 {expected}, 实际 {actual}")]
    MalformedPayload { expected: TaskKind, actual: TaskKind },

    /// 数据源不可用
    #[error("数据源不可用: {0}")]
    SourceUnavailable(String),

    /// 未知错误
    #[error("未知错误: {0}")]
    Unknown(String),
}

impl UpdateError {
    /// 获取错误分类
    pub fn category(&self) -> ErrorCategory {
        match self {
            UpdateError::Config(_) | UpdateError::MissingParam { .. } => {
                ErrorCategory::Configuration
            }
            UpdateError::Network(_)
            | UpdateError::Timeout(_)
            | UpdateError::SourceUnavailable(_) => ErrorCategory::Transient,
            UpdateError::RateLimited(_) => ErrorCategory::RateLimited,
            UpdateError::EmptyPayload(_)
            | UpdateError::MalformedPayload { .. }
            | UpdateError::Unknown(_) => ErrorCategory::Permanent,
        }
    }

    /// 是否为配置/提交边界错误（同步返回调用方，不进入队列）
    pub fn is_config(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }
}

/// 错误分类
///
/// 调度器的重试只看预算不看分类；分类用于日志和状态展示。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// 临时错误
    Transient,
    /// 速率限制
    RateLimited,
    /// 永久错误
    Permanent,
    /// 配置错误
    Configuration,
}

/// 重试策略
///
/// 只负责计算第 n 次重试前的等待时间；是否重试由任务的重试预算决定。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 初始延迟（毫秒）
    pub initial_delay_ms: u64,
    /// 最大延迟（毫秒）
    pub max_delay_ms: u64,
    /// 延迟倍数（指数退避）
    pub backoff_multiplier: f64,
    /// 是否添加抖动
    pub add_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// 无等待策略（测试和手动触发场景）
    pub fn immediate() -> Self {
        Self {
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// 计算第 n 次重试前的延迟
    pub fn calculate_delay(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::from_millis(0);
        }

        let delay = self.initial_delay_ms as f64
            * self.backoff_multiplier.powi((retry_count - 1) as i32);
        let delay = delay.min(self.max_delay_ms as f64) as u64;

        let delay = if self.add_jitter {
            // 添加 ±25% 的抖动
            let jitter_range = delay / 4;
            if jitter_range > 0 {
                let jitter = rand::random::<u64>() % (jitter_range * 2);
                delay.saturating_sub(jitter_range).saturating_add(jitter)
            } else {
                delay
            }
        } else {
            delay
        };

        Duration::from_millis(delay)
    }
}
