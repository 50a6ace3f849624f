//! 数据源接口
//!
//! 核心只依赖该能力：给定任务类型与参数，返回结果或失败。
//! 真实抓取客户端在核心之外实现并注入；核心对失败种类一视同仁，
//! 也绝不在失败时用伪造数据兜底——失败必须经由 error 通道暴露。

use async_trait::async_trait;

use crate::model::MallData;
use crate::updater::{TaskKind, TaskParams, UpdateError};

/// 数据获取能力
#[async_trait]
pub trait DataSource: Send + Sync {
    /// 执行一次数据获取
    ///
    /// 返回数据的标签必须与 `kind` 一致，否则调度器按格式错误处理。
    /// 网络错误、空数据、限流等一律通过 [`UpdateError`] 返回。
    async fn fetch(&self, kind: TaskKind, params: &TaskParams) -> Result<MallData, UpdateError>;
}
