use async_trait::async_trait;

use crate::errors::Result;
use crate::models::TaskMessage;

/// Mediator每取到一个就绪任务就同步调用一次的执行回调
///
/// 回调返回的错误不会在调用侧被捕获, 会终止调用它的循环;
/// 希望吞吐不受任务执行时间限制的实现应把任务转交给工作池后立即返回。
#[async_trait]
pub trait ExecutionCallback: Send + Sync {
    async fn execute(&self, task: TaskMessage) -> Result<()>;
}
