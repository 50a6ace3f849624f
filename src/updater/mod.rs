pub mod cache;
pub mod error;
pub mod events;
pub mod manager;
pub mod queue;
pub mod task;

pub use cache::{CachedData, DataCache};
pub use error::{ErrorCategory, RetryPolicy, UpdateError};
pub use events::{CallbackRegistry, EventChannel, ServiceStatus, SubscriptionId, UpdateEvent};
pub use manager::{RealtimeUpdater, UpdaterStatus};
pub use queue::TaskQueue;
pub use task::{cache_key_for, TaskKind, TaskParams, UpdateTask};
