// 配置管理模块

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::updater::{RetryPolicy, TaskKind, TaskParams, UpdateError};

/// 更新间隔硬下限（秒），低于该值的配置一律拒绝
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 60;

/// 默认更新间隔（秒）
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 300;

/// 默认工作协程数量
pub const DEFAULT_MAX_WORKERS: usize = 3;

/// 默认单次获取超时（秒）
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// 默认最大重试次数
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// 常驻任务
///
/// 周期注入循环每个周期注入一次的任务描述。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingTask {
    /// 任务类型
    pub kind: TaskKind,
    /// 任务参数
    #[serde(default)]
    pub params: TaskParams,
    /// 优先级
    pub priority: u8,
}

/// 更新器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// 更新间隔（秒）
    pub update_interval_secs: u64,
    /// 工作协程数量
    pub max_workers: usize,
    /// 单次获取超时（秒）
    pub fetch_timeout_secs: u64,
    /// 提交任务的默认最大重试次数
    pub default_max_retries: u32,
    /// 重试退避策略
    pub retry: RetryPolicy,
    /// 常驻任务列表
    pub standing_tasks: Vec<StandingTask>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            max_workers: DEFAULT_MAX_WORKERS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            default_max_retries: DEFAULT_MAX_RETRIES,
            retry: RetryPolicy::default(),
            standing_tasks: default_standing_tasks(),
        }
    }
}

impl UpdaterConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<(), UpdateError> {
        if self.update_interval_secs < MIN_UPDATE_INTERVAL_SECS {
            return Err(UpdateError::Config(format!(
                "更新间隔不能小于{}秒",
                MIN_UPDATE_INTERVAL_SECS
            )));
        }
        if self.max_workers == 0 {
            return Err(UpdateError::Config("工作协程数量必须大于0".to_string()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(UpdateError::Config("获取超时必须大于0秒".to_string()));
        }
        Ok(())
    }
}

/// 默认常驻任务：商品列表、热门商品、分析数据
pub fn default_standing_tasks() -> Vec<StandingTask> {
    let mut list_params = TaskParams::new();
    list_params.insert("keyword".to_string(), json!("美妆"));
    list_params.insert("limit".to_string(), json!(20));

    vec![
        StandingTask {
            kind: TaskKind::ProductList,
            params: list_params,
            priority: 2,
        },
        StandingTask {
            kind: TaskKind::Trending,
            params: TaskParams::new(),
            priority: 2,
        },
        StandingTask {
            kind: TaskKind::Analytics,
            params: TaskParams::new(),
            priority: 3,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = UpdaterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.update_interval_secs, 300);
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.standing_tasks.len(), 3);
    }

    #[test]
    fn test_interval_below_floor_rejected() {
        let config = UpdaterConfig {
            update_interval_secs: 59,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = UpdaterConfig {
            max_workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_standing_tasks_match_refresh_set() {
        let tasks = default_standing_tasks();
        assert_eq!(tasks[0].kind, TaskKind::ProductList);
        assert_eq!(tasks[0].priority, 2);
        assert_eq!(tasks[0].params["keyword"], "美妆");
        assert_eq!(tasks[1].kind, TaskKind::Trending);
        assert_eq!(tasks[2].kind, TaskKind::Analytics);
        assert_eq!(tasks[2].priority, 3);
    }
}
