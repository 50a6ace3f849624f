//! 数据缓存
//!
//! 按逻辑键保存最近一次成功结果。写入为整条原子覆盖；
//! 缓存自身不做 TTL 过期，新鲜度判断交由调用方比较 `updated_at`。

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;

use crate::model::MallData;

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CachedData {
    /// 缓存的数据
    pub data: MallData,
    /// 最近一次成功写入时间
    pub updated_at: DateTime<Utc>,
}

/// 最近值缓存
#[derive(Debug, Default)]
pub struct DataCache {
    entries: DashMap<String, CachedData>,
}

impl DataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 非阻塞读取
    pub fn get(&self, key: &str) -> Option<CachedData> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    /// 写入（整条覆盖，写入时间取当前时刻）
    pub fn set(&self, key: impl Into<String>, data: MallData) {
        self.entries.insert(
            key.into(),
            CachedData {
                data,
                updated_at: Utc::now(),
            },
        );
    }

    /// 条目数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 各键最近更新时间快照
    pub fn last_updates(&self) -> HashMap<String, DateTime<Utc>> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().updated_at))
            .collect()
    }

    /// 清空所有条目
    pub fn clear(&self) {
        self.entries.clear();
    }
}
