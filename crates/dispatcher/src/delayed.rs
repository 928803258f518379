use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use tracing::debug;

use conveyor_core::{BackgroundLoop, HoldQueue, PeriodicBackend, ReadyQueue, Result};

/// 延迟任务控制器
///
/// 每次迭代做三件事: 让周期后端跑一遍到期检查, 扫一条持有队列,
/// 然后按固定节奏睡眠。持有队列的扫描是非阻塞单条的: 取出一条,
/// 到期就晋升进就绪队列, 未到期原样放回队尾。轮转保证每条持有
/// 任务都会被周期性地重新审视, 不依赖队列有序。
pub struct DelayedTaskController {
    ready: Arc<ReadyQueue>,
    hold: Arc<HoldQueue>,
    periodic: Arc<dyn PeriodicBackend>,
    pacing: Duration,
}

impl DelayedTaskController {
    pub fn new(
        ready: Arc<ReadyQueue>,
        hold: Arc<HoldQueue>,
        periodic: Arc<dyn PeriodicBackend>,
        pacing: Duration,
    ) -> Self {
        Self {
            ready,
            hold,
            periodic,
            pacing,
        }
    }

    /// 审视持有队列头部的一条任务
    async fn sweep_hold_queue(&self) -> Result<()> {
        if let Some(entry) = self.hold.try_pop().await {
            if entry.is_due(Utc::now()) {
                debug!(
                    "任务 {}[{}] 到期, 晋升至就绪队列",
                    entry.task.task_name, entry.task.task_id
                );
                counter!("conveyor.tasks_promoted").increment(1);
                self.ready.push(entry.task)?;
            } else {
                // 未到期, 放回队尾等下一轮
                self.hold.push(entry)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BackgroundLoop for DelayedTaskController {
    fn name(&self) -> &'static str {
        "delayed-task-controller"
    }

    async fn on_iteration(&self) -> Result<()> {
        self.periodic.run_due_periodic_tasks().await?;
        self.sweep_hold_queue().await?;
        tokio::time::sleep(self.pacing).await;
        Ok(())
    }
}
