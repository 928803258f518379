use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use conveyor_core::{ConveyorError, ExecutionCallback, Result, TaskMessage};

use crate::registry::TaskRegistry;

/// 有界并发的任务执行池
///
/// 作为中介的执行回调接入调度: execute解析执行器, 占一个并发额度,
/// 然后把任务抛进独立的tokio任务里跑, 不让单个慢任务拖住调度循环。
/// 池满时execute挂起等待额度, 这是就绪队列的天然背压。
/// 未注册的任务记录后丢弃, 不算回调错误, 调度循环继续活着。
pub struct TaskPool {
    registry: Arc<TaskRegistry>,
    semaphore: Arc<Semaphore>,
}

impl TaskPool {
    pub fn new(registry: Arc<TaskRegistry>, max_concurrent_tasks: usize) -> Self {
        Self {
            registry,
            semaphore: Arc::new(Semaphore::new(max_concurrent_tasks)),
        }
    }

    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[async_trait]
impl ExecutionCallback for TaskPool {
    async fn execute(&self, task: TaskMessage) -> Result<()> {
        let Some(executor) = self.registry.resolve(&task.task_name).await else {
            error!(
                "收到未注册的任务 {}[{}], 已丢弃",
                task.task_name, task.task_id
            );
            counter!("conveyor.tasks_unknown").increment(1);
            return Ok(());
        };

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ConveyorError::Internal(format!("执行池额度不可用: {e}")))?;

        tokio::spawn(async move {
            let _permit = permit;
            let started = Instant::now();

            match executor.run(&task).await {
                Ok(outcome) if outcome.success => {
                    info!(
                        "任务 {}[{}] 执行成功, 耗时 {}ms",
                        task.task_name,
                        task.task_id,
                        started.elapsed().as_millis()
                    );
                }
                Ok(outcome) => {
                    counter!("conveyor.tasks_failed").increment(1);
                    warn!(
                        "任务 {}[{}] 执行失败: {}",
                        task.task_name,
                        task.task_id,
                        outcome
                            .error_message
                            .unwrap_or_else(|| "无错误信息".to_string())
                    );
                }
                Err(e) => {
                    counter!("conveyor.tasks_failed").increment(1);
                    error!("任务 {}[{}] 执行出错: {}", task.task_name, task.task_id, e);
                }
            }
            counter!("conveyor.tasks_executed").increment(1);
        });

        Ok(())
    }
}
