use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// 任务参数
///
/// 有序键值映射，迭代顺序稳定，保证缓存键推导的确定性。
pub type TaskParams = BTreeMap<String, serde_json::Value>;

/// 任务类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// 商品列表
    ProductList,
    /// 商品详情
    ProductDetail,
    /// 热门商品
    Trending,
    /// 分析数据
    Analytics,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ProductList => "product_list",
            TaskKind::ProductDetail => "product_detail",
            TaskKind::Trending => "trending",
            TaskKind::Analytics => "analytics",
        }
    }

    /// 是否为单例任务（参数不参与缓存键）
    pub fn is_singleton(&self) -> bool {
        matches!(self, TaskKind::Trending | TaskKind::Analytics)
    }

    /// 提交时必须携带的参数
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            TaskKind::ProductDetail => &["product_id"],
            _ => &[],
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 任务ID时间戳源（微秒），强制单调递增保证同类型任务ID唯一
static LAST_ID_MICROS: AtomicI64 = AtomicI64::new(0);

fn next_id_micros() -> i64 {
    let now = Utc::now().timestamp_micros();
    let mut prev = LAST_ID_MICROS.load(Ordering::Relaxed);
    loop {
        let next = if now > prev { now } else { prev + 1 };
        match LAST_ID_MICROS.compare_exchange_weak(prev, next, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

/// 更新任务
///
/// 任务值本身不再被调度器原地修改；重试通过 [`UpdateTask::with_retry`]
/// 生成降级副本重新入队，避免同一对象复用带来的别名问题。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTask {
    /// 任务ID（类型 + 单调微秒时间戳）
    pub id: String,
    /// 任务类型
    pub kind: TaskKind,
    /// 任务参数
    pub params: TaskParams,
    /// 优先级（1 为最高，数值越小越先出队）
    pub priority: u8,
    /// 创建时间（仅用于诊断）
    pub created_at: DateTime<Utc>,
    /// 已重试次数
    pub retry_count: u32,
    /// 最大重试次数
    pub max_retries: u32,
}

impl UpdateTask {
    pub fn new(kind: TaskKind, params: TaskParams, priority: u8, max_retries: u32) -> Self {
        Self {
            id: format!("{}_{}", kind.as_str(), next_id_micros()),
            kind,
            params,
            priority,
            created_at: Utc::now(),
            retry_count: 0,
            max_retries,
        }
    }

    /// 任务对应的缓存键
    pub fn cache_key(&self) -> String {
        cache_key_for(self.kind, &self.params)
    }

    /// 重试预算是否已用尽
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// 生成降级重试副本（retry_count + 1，优先级 + 1）
    ///
    /// ID 保持不变，便于按任务追踪整个重试链。
    pub fn with_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            priority: self.priority.saturating_add(1),
            ..self.clone()
        }
    }
}

/// 计算缓存键：单例任务为类型名，其余为 `类型名:参数串`
///
/// 参数串按键排序拼接，同一组参数总是得到同一个键。
pub fn cache_key_for(kind: TaskKind, params: &TaskParams) -> String {
    if kind.is_singleton() || params.is_empty() {
        return kind.as_str().to_string();
    }

    let joined = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, plain_value(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}:{}", kind.as_str(), joined)
}

/// 字符串值去掉 JSON 引号，其余类型用紧凑 JSON 表示
fn plain_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_creation() {
        let mut params = TaskParams::new();
        params.insert("keyword".to_string(), json!("美妆"));
        params.insert("limit".to_string(), json!(20));

        let task = UpdateTask::new(TaskKind::ProductList, params, 2, 3);

        assert!(task.id.starts_with("product_list_"));
        assert_eq!(task.priority, 2);
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.max_retries, 3);
        assert!(!task.retries_exhausted());
    }

    #[test]
    fn test_task_ids_unique_and_monotonic() {
        let ids: Vec<String> = (0..100)
            .map(|_| UpdateTask::new(TaskKind::Trending, TaskParams::new(), 2, 3).id)
            .collect();

        let unique: std::collections::HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), 100);

        // 去掉类型前缀后的时间戳严格递增
        let stamps: Vec<i64> = ids
            .iter()
            .map(|id| id.trim_start_matches("trending_").parse().unwrap())
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_cache_key_shapes() {
        let mut params = TaskParams::new();
        params.insert("keyword".to_string(), json!("美妆"));
        params.insert("limit".to_string(), json!(20));

        assert_eq!(
            cache_key_for(TaskKind::ProductList, &params),
            "product_list:keyword=美妆&limit=20"
        );

        let mut detail_params = TaskParams::new();
        detail_params.insert("product_id".to_string(), json!("p_001"));
        assert_eq!(
            cache_key_for(TaskKind::ProductDetail, &detail_params),
            "product_detail:product_id=p_001"
        );

        // 单例任务忽略参数
        assert_eq!(cache_key_for(TaskKind::Trending, &params), "trending");
        assert_eq!(cache_key_for(TaskKind::Analytics, &TaskParams::new()), "analytics");
    }

    #[test]
    fn test_cache_key_stable_under_insertion_order() {
        let mut a = TaskParams::new();
        a.insert("limit".to_string(), json!(20));
        a.insert("keyword".to_string(), json!("美妆"));

        let mut b = TaskParams::new();
        b.insert("keyword".to_string(), json!("美妆"));
        b.insert("limit".to_string(), json!(20));

        assert_eq!(
            cache_key_for(TaskKind::ProductList, &a),
            cache_key_for(TaskKind::ProductList, &b)
        );
    }

    #[test]
    fn test_with_retry() {
        let task = UpdateTask::new(TaskKind::Trending, TaskParams::new(), 2, 2);

        let retry1 = task.with_retry();
        assert_eq!(retry1.id, task.id);
        assert_eq!(retry1.retry_count, 1);
        assert_eq!(retry1.priority, 3);
        assert!(!retry1.retries_exhausted());

        let retry2 = retry1.with_retry();
        assert_eq!(retry2.retry_count, 2);
        assert_eq!(retry2.priority, 4);
        assert!(retry2.retries_exhausted());
    }

    #[test]
    fn test_priority_demotion_saturates() {
        let mut task = UpdateTask::new(TaskKind::Trending, TaskParams::new(), u8::MAX, 100);
        task = task.with_retry();
        assert_eq!(task.priority, u8::MAX);
    }

    #[test]
    fn test_required_params() {
        assert_eq!(TaskKind::ProductDetail.required_params(), &["product_id"]);
        assert!(TaskKind::Trending.required_params().is_empty());
        assert!(TaskKind::ProductList.required_params().is_empty());
    }
}
