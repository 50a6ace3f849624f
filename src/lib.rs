// XHS Mall Realtime Library
// 小红书商城实时数据更新核心库

// 配置管理模块
pub mod config;

// 数据模型模块
pub mod model;

// 数据源接口模块
pub mod source;

// 实时更新器模块
pub mod updater;

// 导出常用类型
pub use config::{StandingTask, UpdaterConfig, MIN_UPDATE_INTERVAL_SECS};
pub use model::{CategoryStat, MallAnalytics, MallData, MallProduct, ProductDetail, ShopInfo};
pub use source::DataSource;
pub use updater::{
    CachedData, DataCache, ErrorCategory, EventChannel, RealtimeUpdater, RetryPolicy,
    ServiceStatus, SubscriptionId, TaskKind, TaskParams, UpdateError, UpdateEvent, UpdateTask,
    UpdaterStatus,
};
