use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::debug;

use conveyor_core::{
    BackgroundLoop, HoldEntry, HoldQueue, ReadyQueue, Result, TaskMessage, Transport,
};

/// 一条消息入站后的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Ready,
    Held,
}

/// 入站路由规则: eta在未来的进保留队列, 其余全部直接进就绪队列
///
/// 没有eta或eta已过期的消息一视同仁, 立即可派发。
pub fn route_message(
    task: TaskMessage,
    ready: &ReadyQueue,
    hold: &HoldQueue,
    now: DateTime<Utc>,
) -> Result<Route> {
    match task.eta {
        Some(eta) if eta > now => {
            debug!("任务 {}[{}] 保留至 {}", task.task_name, task.task_id, eta);
            hold.push(HoldEntry {
                task,
                eligible_at: eta,
            })?;
            Ok(Route::Held)
        }
        _ => {
            debug!("任务 {}[{}] 直接就绪", task.task_name, task.task_id);
            ready.push(task)?;
            Ok(Route::Ready)
        }
    }
}

/// 任务消费者
///
/// 从传输层逐条拉取消息并按路由规则分发到内部队列。
/// 传输层为空时小憩一段再拉, 避免空转; 传输层错误向上抛, 终止消费循环。
pub struct TaskConsumer {
    transport: Arc<dyn Transport>,
    ready: Arc<ReadyQueue>,
    hold: Arc<HoldQueue>,
    idle_wait: std::time::Duration,
}

impl TaskConsumer {
    pub fn new(
        transport: Arc<dyn Transport>,
        ready: Arc<ReadyQueue>,
        hold: Arc<HoldQueue>,
        idle_wait: std::time::Duration,
    ) -> Self {
        Self {
            transport,
            ready,
            hold,
            idle_wait,
        }
    }
}

#[async_trait]
impl BackgroundLoop for TaskConsumer {
    fn name(&self) -> &'static str {
        "task-consumer"
    }

    async fn on_iteration(&self) -> Result<()> {
        match self.transport.fetch().await? {
            Some(task) => {
                counter!("conveyor.tasks_ingested").increment(1);
                route_message(task, &self.ready, &self.hold, Utc::now())?;
            }
            None => {
                tokio::time::sleep(self.idle_wait).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use conveyor_core::{spawn_loop, WorkQueue};
    use conveyor_testing_utils::{task_named, task_overdue, RecordingTransport};

    fn queues() -> (Arc<ReadyQueue>, Arc<HoldQueue>) {
        (
            Arc::new(WorkQueue::new("ready")),
            Arc::new(WorkQueue::new("hold")),
        )
    }

    #[tokio::test]
    async fn test_absent_eta_routes_to_ready() {
        let (ready, hold) = queues();
        let route = route_message(task_named("demo.now"), &ready, &hold, Utc::now()).unwrap();
        assert_eq!(route, Route::Ready);
        assert_eq!(ready.len(), 1);
        assert_eq!(hold.len(), 0);
    }

    #[tokio::test]
    async fn test_past_eta_routes_to_ready() {
        let (ready, hold) = queues();
        let route = route_message(task_overdue("demo.late", 60), &ready, &hold, Utc::now()).unwrap();
        assert_eq!(route, Route::Ready);
        assert_eq!(ready.len(), 1);
        assert_eq!(hold.len(), 0);
    }

    #[tokio::test]
    async fn test_future_eta_routes_to_hold_with_eligibility() {
        let (ready, hold) = queues();
        let now = Utc::now();
        let eta = now + Duration::seconds(120);
        let task = task_named("demo.future").with_eta(eta);
        let route = route_message(task, &ready, &hold, now).unwrap();
        assert_eq!(route, Route::Held);
        assert_eq!(ready.len(), 0);

        let entry = hold.try_pop().await.unwrap();
        assert_eq!(entry.eligible_at, eta);
        assert_eq!(entry.task.task_name, "demo.future");
    }

    #[tokio::test]
    async fn test_eta_exactly_now_is_ready() {
        let (ready, hold) = queues();
        let now = Utc::now();
        let task = task_named("demo.exact").with_eta(now);
        let route = route_message(task, &ready, &hold, now).unwrap();
        assert_eq!(route, Route::Ready);
    }

    #[tokio::test]
    async fn test_consumer_loop_drains_transport_into_queues() {
        let transport = Arc::new(RecordingTransport::new());
        transport.feed(task_named("demo.a"));
        transport.feed(task_named("demo.b").with_eta(Utc::now() + Duration::seconds(600)));
        transport.feed(task_named("demo.c"));

        let (ready, hold) = queues();
        let consumer = TaskConsumer::new(
            transport.clone(),
            ready.clone(),
            hold.clone(),
            std::time::Duration::from_millis(10),
        );

        let handle = spawn_loop(Arc::new(consumer));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        handle.stop();

        assert_eq!(ready.len(), 2);
        assert_eq!(hold.len(), 1);
    }
}
