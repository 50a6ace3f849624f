//! 实时数据更新器
//!
//! 后台轮询服务：周期循环注入常驻任务，多工作协程按优先级消费队列，
//! 失败任务降级延迟重试，成功结果写入缓存并通过事件通道通知订阅者。
//!
//! 更新器由组合根显式构造并注入数据源，不提供全局单例；
//! 每个实例拥有独立的队列、缓存和订阅表，可单独测试。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cache::{CachedData, DataCache};
use super::error::UpdateError;
use super::events::{
    CallbackRegistry, EventChannel, ServiceStatus, SubscriptionId, UpdateEvent,
};
use super::queue::TaskQueue;
use super::task::{TaskKind, TaskParams, UpdateTask};
use crate::config::{UpdaterConfig, MIN_UPDATE_INTERVAL_SECS};
use crate::source::DataSource;

/// 工作协程空闲时的轮询节拍
const WORKER_IDLE_POLL: Duration = Duration::from_millis(100);

/// 停止时等待周期循环退出的时限
const UPDATE_LOOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// 停止时等待单个工作协程退出的时限
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 终态失败任务历史上限，超出时丢弃最旧记录
const FAILED_HISTORY_LIMIT: usize = 256;

/// 更新器状态快照
#[derive(Debug, Clone, Serialize)]
pub struct UpdaterStatus {
    /// 是否运行中
    pub is_running: bool,
    /// 队列深度
    pub queue_size: usize,
    /// 已完成任务数
    pub completed_tasks: u64,
    /// 终态失败任务数
    pub failed_tasks: u64,
    /// 当前生效的更新间隔（秒）
    pub update_interval_secs: u64,
    /// 各缓存键最近更新时间
    pub last_updates: HashMap<String, DateTime<Utc>>,
}

/// 各循环共享的运行时内核
struct UpdaterInner {
    config: RwLock<UpdaterConfig>,
    queue: TaskQueue,
    cache: DataCache,
    callbacks: CallbackRegistry,
    source: Arc<dyn DataSource>,
    is_running: AtomicBool,
    completed_count: AtomicU64,
    failed_count: AtomicU64,
    failed_history: Mutex<VecDeque<UpdateTask>>,
}

/// 实时数据更新器
pub struct RealtimeUpdater {
    inner: Arc<UpdaterInner>,
    /// 当前运行周期的取消令牌；令牌取消后不可复用，每次 start 重建
    cancel_token: Mutex<CancellationToken>,
    update_handle: Mutex<Option<JoinHandle<()>>>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl RealtimeUpdater {
    /// 使用默认配置创建更新器
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self::build(source, UpdaterConfig::default())
    }

    /// 使用指定配置创建更新器
    pub fn with_config(
        source: Arc<dyn DataSource>,
        config: UpdaterConfig,
    ) -> Result<Self, UpdateError> {
        config.validate()?;
        Ok(Self::build(source, config))
    }

    fn build(source: Arc<dyn DataSource>, config: UpdaterConfig) -> Self {
        Self {
            inner: Arc::new(UpdaterInner {
                config: RwLock::new(config),
                queue: TaskQueue::new(),
                cache: DataCache::new(),
                callbacks: CallbackRegistry::new(),
                source,
                is_running: AtomicBool::new(false),
                completed_count: AtomicU64::new(0),
                failed_count: AtomicU64::new(0),
                failed_history: Mutex::new(VecDeque::new()),
            }),
            cancel_token: Mutex::new(CancellationToken::new()),
            update_handle: Mutex::new(None),
            worker_handles: Mutex::new(Vec::new()),
        }
    }

    /// 注册事件监听器，返回订阅ID
    pub fn subscribe<F>(&self, channel: EventChannel, listener: F) -> SubscriptionId
    where
        F: Fn(&UpdateEvent) + Send + Sync + 'static,
    {
        self.inner.callbacks.subscribe(channel, listener)
    }

    /// 按订阅ID移除监听器
    pub fn unsubscribe(&self, channel: EventChannel, id: SubscriptionId) -> bool {
        self.inner.callbacks.unsubscribe(channel, id)
    }

    /// 设置更新间隔（秒）
    ///
    /// 低于下限的值被拒绝，原间隔保持不变；合法值从下一个周期开始生效，
    /// 不打断进行中的周期。
    pub fn set_update_interval(&self, secs: u64) -> Result<(), UpdateError> {
        if secs < MIN_UPDATE_INTERVAL_SECS {
            return Err(UpdateError::Config(format!(
                "更新间隔不能小于{}秒",
                MIN_UPDATE_INTERVAL_SECS
            )));
        }
        self.inner.config.write().update_interval_secs = secs;
        info!("更新间隔已设置为 {} 秒", secs);
        Ok(())
    }

    /// 启动服务
    ///
    /// 重复调用仅告警不报错。启动时立即注入一次常驻任务，
    /// 之后由周期循环按间隔注入。
    pub async fn start(&self) {
        if self.inner.is_running.swap(true, Ordering::SeqCst) {
            warn!("实时更新服务已在运行");
            return;
        }

        info!("启动实时更新服务");
        let token = CancellationToken::new();
        *self.cancel_token.lock() = token.clone();

        // 周期注入循环
        *self.update_handle.lock() = Some(tokio::spawn(update_loop(
            self.inner.clone(),
            token.clone(),
        )));

        // 工作协程池
        let max_workers = self.inner.config.read().max_workers;
        {
            let mut handles = self.worker_handles.lock();
            for worker_id in 1..=max_workers {
                handles.push(tokio::spawn(worker_loop(
                    self.inner.clone(),
                    token.clone(),
                    worker_id,
                )));
            }
        }

        inject_standing_tasks(&self.inner);

        self.inner.callbacks.emit(&UpdateEvent::StatusChanged {
            status: ServiceStatus::Started,
        });
    }

    /// 停止服务
    ///
    /// 协作式停止：各循环完成手头工作后退出，限时等待；
    /// 进行中的获取不会被强杀。队列与缓存保留，再次 start 继续消费。
    pub async fn stop(&self) {
        if !self.inner.is_running.swap(false, Ordering::SeqCst) {
            warn!("实时更新服务未在运行");
            return;
        }

        info!("停止实时更新服务");
        self.cancel_token.lock().cancel();

        let update_handle = self.update_handle.lock().take();
        if let Some(handle) = update_handle {
            if tokio::time::timeout(UPDATE_LOOP_JOIN_TIMEOUT, handle)
                .await
                .is_err()
            {
                warn!("周期循环未在时限内退出");
            }
        }

        let handles: Vec<JoinHandle<()>> = self.worker_handles.lock().drain(..).collect();
        for handle in handles {
            if tokio::time::timeout(WORKER_JOIN_TIMEOUT, handle).await.is_err() {
                warn!("工作协程未在时限内退出");
            }
        }

        self.inner.callbacks.emit(&UpdateEvent::StatusChanged {
            status: ServiceStatus::Stopped,
        });
    }

    /// 是否运行中
    pub fn is_running(&self) -> bool {
        self.inner.is_running.load(Ordering::SeqCst)
    }

    /// 提交更新任务（使用配置的默认重试预算）
    ///
    /// 立即返回任务ID，不等待执行；服务未启动时任务同样入队，
    /// 下次启动后开始消费。
    pub fn submit(
        &self,
        kind: TaskKind,
        params: TaskParams,
        priority: u8,
    ) -> Result<String, UpdateError> {
        let max_retries = self.inner.config.read().default_max_retries;
        self.submit_with_retries(kind, params, priority, max_retries)
    }

    /// 提交更新任务并指定重试预算
    pub fn submit_with_retries(
        &self,
        kind: TaskKind,
        params: TaskParams,
        priority: u8,
        max_retries: u32,
    ) -> Result<String, UpdateError> {
        for &param in kind.required_params() {
            if !params.contains_key(param) {
                return Err(UpdateError::MissingParam { kind, param });
            }
        }

        let task = UpdateTask::new(kind, params, priority, max_retries);
        let task_id = task.id.clone();
        info!("添加更新任务: {} ({})", task_id, kind);
        self.inner.queue.push(task);
        Ok(task_id)
    }

    /// 非阻塞读取缓存
    pub fn get_cached(&self, key: &str) -> Option<CachedData> {
        self.inner.cache.get(key)
    }

    /// 清空缓存（不影响队列和在途任务）
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
        info!("缓存已清空");
    }

    /// 获取状态快照
    pub fn status(&self) -> UpdaterStatus {
        UpdaterStatus {
            is_running: self.is_running(),
            queue_size: self.inner.queue.len(),
            completed_tasks: self.inner.completed_count.load(Ordering::SeqCst),
            failed_tasks: self.inner.failed_count.load(Ordering::SeqCst),
            update_interval_secs: self.inner.config.read().update_interval_secs,
            last_updates: self.inner.cache.last_updates(),
        }
    }

    /// 终态失败任务快照
    pub fn failed_tasks(&self) -> Vec<UpdateTask> {
        self.inner.failed_history.lock().iter().cloned().collect()
    }

    /// 清空失败任务历史，返回清除数量（不重置失败计数）
    pub fn clear_failed(&self) -> usize {
        let mut history = self.inner.failed_history.lock();
        let count = history.len();
        history.clear();
        info!("清除了 {} 个失败任务记录", count);
        count
    }
}

/// 周期注入循环
///
/// 每个周期重新读取配置的间隔，set_update_interval 从下个周期生效。
async fn update_loop(inner: Arc<UpdaterInner>, cancel_token: CancellationToken) {
    loop {
        let interval = Duration::from_secs(inner.config.read().update_interval_secs);
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        if !inner.is_running.load(Ordering::SeqCst) {
            break;
        }
        inject_standing_tasks(&inner);
    }
    debug!("周期注入循环已退出");
}

/// 注入一轮常驻任务
fn inject_standing_tasks(inner: &UpdaterInner) {
    let (standing, max_retries) = {
        let config = inner.config.read();
        (config.standing_tasks.clone(), config.default_max_retries)
    };

    for standing_task in standing {
        let task = UpdateTask::new(
            standing_task.kind,
            standing_task.params,
            standing_task.priority,
            max_retries,
        );
        debug!("注入常驻任务: {} ({})", task.id, task.kind);
        inner.queue.push(task);
    }
}

/// 工作协程循环
///
/// 空队列时按固定节拍轮询，以便及时观察停止信号；
/// 每次完整执行一个任务后再取下一个，并发度来自协程数量。
async fn worker_loop(inner: Arc<UpdaterInner>, cancel_token: CancellationToken, worker_id: usize) {
    debug!("[工作协程{}] 启动", worker_id);
    loop {
        if cancel_token.is_cancelled() {
            break;
        }
        match inner.queue.try_pop() {
            Some(task) => execute_task(&inner, &cancel_token, worker_id, task).await,
            None => {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = tokio::time::sleep(WORKER_IDLE_POLL) => {}
                }
            }
        }
    }
    debug!("[工作协程{}] 已退出", worker_id);
}

/// 执行单个任务
///
/// 数据源调用带超时，超时按普通失败进入重试路径；
/// 任何失败都不会终结工作协程。
async fn execute_task(
    inner: &Arc<UpdaterInner>,
    cancel_token: &CancellationToken,
    worker_id: usize,
    task: UpdateTask,
) {
    info!("[工作协程{}] 执行任务: {} ({})", worker_id, task.id, task.kind);

    let fetch_timeout = Duration::from_secs(inner.config.read().fetch_timeout_secs);
    let result = match tokio::time::timeout(fetch_timeout, inner.source.fetch(task.kind, &task.params))
        .await
    {
        Ok(result) => result,
        Err(_) => Err(UpdateError::Timeout(format!(
            "任务 {} 超过 {} 秒未返回",
            task.id,
            fetch_timeout.as_secs()
        ))),
    };

    match result {
        Ok(data) if data.kind() == task.kind => {
            let key = task.cache_key();
            inner.cache.set(key, data.clone());
            inner.completed_count.fetch_add(1, Ordering::SeqCst);
            info!("[工作协程{}] 任务完成: {}", worker_id, task.id);

            inner.callbacks.emit(&UpdateEvent::DataUpdated {
                kind: task.kind,
                data,
                params: task.params,
            });
        }
        Ok(data) => {
            let err = UpdateError::MalformedPayload {
                expected: task.kind,
                actual: data.kind(),
            };
            handle_task_failure(inner, cancel_token, worker_id, task, err);
        }
        Err(err) => handle_task_failure(inner, cancel_token, worker_id, task, err),
    }
}

/// 处理任务失败
///
/// 预算未用尽：生成降级副本，退避延迟后重新入队；
/// 预算已用尽：记入终态失败历史并派发一次 error 事件。
fn handle_task_failure(
    inner: &Arc<UpdaterInner>,
    cancel_token: &CancellationToken,
    worker_id: usize,
    task: UpdateTask,
    err: UpdateError,
) {
    error!("[工作协程{}] 任务执行失败: {} - {}", worker_id, task.id, err);

    if task.retries_exhausted() {
        error!("任务最终失败: {}", task.id);
        inner.failed_count.fetch_add(1, Ordering::SeqCst);
        {
            let mut history = inner.failed_history.lock();
            if history.len() == FAILED_HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(task.clone());
        }
        inner.callbacks.emit(&UpdateEvent::Error {
            message: format!("任务失败: {} - {}", task.id, err),
        });
        return;
    }

    let retry_task = task.with_retry();
    let delay = inner.config.read().retry.calculate_delay(retry_task.retry_count);
    info!(
        "任务重试: {} (第{}次, 延迟{}毫秒)",
        retry_task.id,
        retry_task.retry_count,
        delay.as_millis()
    );

    // 延迟重入队不占用工作协程；停止信号到来时立即入队，重试任务不丢失
    let inner = inner.clone();
    let cancel_token = cancel_token.clone();
    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::select! {
                _ = cancel_token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {}
            }
        }
        inner.queue.push(retry_task);
    });
}
