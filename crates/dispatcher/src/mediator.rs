use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tracing::debug;

use conveyor_core::{BackgroundLoop, ExecutionCallback, ReadyQueue, Result};

/// 调度中介
///
/// 就绪队列与执行回调之间唯一的搬运者, 每次迭代最多搬一个任务。
/// 出队等待有上界, 队列空置时迭代照常结束, 停止请求因此不会被无限期压住。
/// 回调抛出的错误原样向上传, 循环随之终止。
pub struct Mediator {
    ready: Arc<ReadyQueue>,
    callback: Arc<dyn ExecutionCallback>,
    dequeue_wait: Duration,
}

impl Mediator {
    pub fn new(
        ready: Arc<ReadyQueue>,
        callback: Arc<dyn ExecutionCallback>,
        dequeue_wait: Duration,
    ) -> Self {
        Self {
            ready,
            callback,
            dequeue_wait,
        }
    }
}

#[async_trait]
impl BackgroundLoop for Mediator {
    fn name(&self) -> &'static str {
        "mediator"
    }

    async fn on_iteration(&self) -> Result<()> {
        if let Some(task) = self.ready.pop_timeout(self.dequeue_wait).await {
            debug!("中介取出任务 {}[{}]", task.task_name, task.task_id);
            self.callback.execute(task).await?;
            counter!("conveyor.tasks_dispatched").increment(1);
        }
        Ok(())
    }
}
