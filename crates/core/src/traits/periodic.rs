use async_trait::async_trait;

use crate::errors::Result;

/// 周期任务状态后端
///
/// 延迟任务控制器每次迭代询问一次"有哪些周期任务到期"并触发之,
/// 控制器自身不保留任何执行结果。
#[async_trait]
pub trait PeriodicBackend: Send + Sync {
    /// 触发所有到期的周期任务
    async fn run_due_periodic_tasks(&self) -> Result<()>;
}
