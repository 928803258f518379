use async_trait::async_trait;
use tracing::debug;

use conveyor_core::queue::WorkQueue;
use conveyor_core::{ConveyorError, Result, SendOptions, TaskMessage, Transport};

/// 进程内传输层实现, 用于内嵌运行和测试
///
/// 发送即克隆入队; 路由键与投递标志被接受但在进程内没有意义。
pub struct MemoryTransport {
    queue: WorkQueue<TaskMessage>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            queue: WorkQueue::new("memory-transport"),
        }
    }

    /// 当前在途消息数
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, message: &TaskMessage, _options: &SendOptions) -> Result<()> {
        self.queue
            .push(message.clone())
            .map_err(|_| ConveyorError::transport_error("内存传输层已关闭"))?;
        debug!("Task {}[{}] queued on in-memory transport", message.task_name, message.task_id);
        Ok(())
    }

    async fn fetch(&self) -> Result<Option<TaskMessage>> {
        Ok(self.queue.try_pop().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_send_then_fetch_fifo() {
        let transport = MemoryTransport::new();
        let options = SendOptions::default();

        let first = TaskMessage::new("demo.first").with_args(vec![json!(1)]);
        let second = TaskMessage::new("demo.second");
        transport.send(&first, &options).await.unwrap();
        transport.send(&second, &options).await.unwrap();

        assert_eq!(transport.len(), 2);

        let fetched = transport.fetch().await.unwrap().expect("应取到第一条");
        assert_eq!(fetched.task_id, first.task_id);
        assert_eq!(fetched.args, vec![json!(1)]);

        let fetched = transport.fetch().await.unwrap().expect("应取到第二条");
        assert_eq!(fetched.task_id, second.task_id);
    }

    #[tokio::test]
    async fn test_fetch_on_empty_transport() {
        let transport = MemoryTransport::new();
        assert!(transport.fetch().await.unwrap().is_none());
    }
}
