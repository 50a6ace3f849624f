//! 事件通道与回调注册表
//!
//! 三个命名通道：`data_updated` / `error` / `status_changed`。
//! 监听器按注册顺序同步调用；同一监听器注册多次会触发多次；
//! 监听器内部 panic 被捕获并记录，不影响调度器和其他监听器。

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

use super::task::{TaskKind, TaskParams};
use crate::model::MallData;

/// 事件通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventChannel {
    /// 数据更新
    DataUpdated,
    /// 错误
    Error,
    /// 状态变更
    StatusChanged,
}

impl EventChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventChannel::DataUpdated => "data_updated",
            EventChannel::Error => "error",
            EventChannel::StatusChanged => "status_changed",
        }
    }
}

impl fmt::Display for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 服务运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Started,
    Stopped,
}

/// 更新事件载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UpdateEvent {
    /// 一次任务成功完成
    DataUpdated {
        #[serde(rename = "type")]
        kind: TaskKind,
        data: MallData,
        params: TaskParams,
    },
    /// 任务最终失败或周期循环异常
    Error { message: String },
    /// 服务启动/停止
    StatusChanged { status: ServiceStatus },
}

impl UpdateEvent {
    /// 事件所属通道
    pub fn channel(&self) -> EventChannel {
        match self {
            UpdateEvent::DataUpdated { .. } => EventChannel::DataUpdated,
            UpdateEvent::Error { .. } => EventChannel::Error,
            UpdateEvent::StatusChanged { .. } => EventChannel::StatusChanged,
        }
    }
}

/// 订阅ID，用于定点移除监听器
pub type SubscriptionId = u64;

type Listener = Arc<dyn Fn(&UpdateEvent) + Send + Sync>;

/// 回调注册表
#[derive(Default)]
pub struct CallbackRegistry {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<EventChannel, Vec<(SubscriptionId, Listener)>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册监听器，返回订阅ID
    pub fn subscribe<F>(&self, channel: EventChannel, listener: F) -> SubscriptionId
    where
        F: Fn(&UpdateEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .write()
            .entry(channel)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// 按订阅ID移除监听器；返回是否确有移除
    pub fn unsubscribe(&self, channel: EventChannel, id: SubscriptionId) -> bool {
        let mut map = self.listeners.write();
        if let Some(entries) = map.get_mut(&channel) {
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            return entries.len() < before;
        }
        false
    }

    /// 指定通道的监听器数量
    pub fn listener_count(&self, channel: EventChannel) -> usize {
        self.listeners
            .read()
            .get(&channel)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    /// 派发事件，按注册顺序同步调用对应通道的监听器
    ///
    /// 调用前先复制监听器列表再释放锁，监听器内部可以安全地注册/注销。
    pub fn emit(&self, event: &UpdateEvent) {
        let targets: Vec<(SubscriptionId, Listener)> = {
            let map = self.listeners.read();
            map.get(&event.channel()).cloned().unwrap_or_default()
        };

        for (id, listener) in targets {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!(
                    "监听器执行失败: channel={}, subscription={}",
                    event.channel(),
                    id
                );
            }
        }
    }
}
