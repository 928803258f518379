use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::errors::{ConveyorError, Result};
use crate::models::{HoldEntry, TaskMessage};

/// 立即可执行任务的就绪队列(bucket queue)
pub type ReadyQueue = WorkQueue<TaskMessage>;

/// 未到期任务的持有队列
pub type HoldQueue = WorkQueue<HoldEntry>;

/// 并发安全的无界工作队列
///
/// 放入永不阻塞; 取出提供非阻塞和有界等待两种形式。
/// 队列是摄取路径(生产者)与单个控制器(消费者)之间仅有的共享可变资源,
/// 同步完全由队列自身负责, 外部不加锁。
pub struct WorkQueue<T> {
    name: &'static str,
    sender: mpsc::UnboundedSender<T>,
    receiver: Mutex<mpsc::UnboundedReceiver<T>>,
    size: AtomicUsize,
}

impl<T> WorkQueue<T> {
    pub fn new(name: &'static str) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            name,
            sender,
            receiver: Mutex::new(receiver),
            size: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 非阻塞放入
    pub fn push(&self, item: T) -> Result<()> {
        self.sender
            .send(item)
            .map_err(|_| ConveyorError::QueueClosed(self.name.to_string()))?;
        self.size.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// 非阻塞取出, 队列为空时返回None
    pub async fn try_pop(&self) -> Option<T> {
        let mut receiver = self.receiver.lock().await;
        match receiver.try_recv() {
            Ok(item) => {
                self.size.fetch_sub(1, Ordering::SeqCst);
                Some(item)
            }
            Err(_) => None,
        }
    }

    /// 有界等待取出, 等待wait后仍无数据则返回None
    pub async fn pop_timeout(&self, wait: Duration) -> Option<T> {
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(wait, receiver.recv()).await {
            Ok(Some(item)) => {
                self.size.fetch_sub(1, Ordering::SeqCst);
                Some(item)
            }
            // 通道关闭或等待超时
            Ok(None) | Err(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn test_push_and_try_pop_fifo() {
        let queue: WorkQueue<u32> = WorkQueue::new("test");
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        queue.push(3).unwrap();

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_pop().await, Some(1));
        assert_eq!(queue.try_pop().await, Some(2));
        assert_eq!(queue.try_pop().await, Some(3));
        assert_eq!(queue.try_pop().await, None);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_try_pop_on_empty_queue() {
        let queue: WorkQueue<u32> = WorkQueue::new("test");
        assert_eq!(queue.try_pop().await, None);
    }

    #[tokio::test]
    async fn test_pop_timeout_elapses_without_data() {
        let queue: WorkQueue<u32> = WorkQueue::new("test");
        let started = Instant::now();
        let popped = queue.pop_timeout(Duration::from_millis(50)).await;
        assert_eq!(popped, None);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_pop_timeout_returns_available_data_immediately() {
        let queue: WorkQueue<u32> = WorkQueue::new("test");
        queue.push(7).unwrap();

        let started = Instant::now();
        let popped = queue.pop_timeout(Duration::from_secs(5)).await;
        assert_eq!(popped, Some(7));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_pop_timeout_wakes_on_late_push() {
        let queue: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::new("test"));
        let producer_queue = queue.clone();

        let producer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer_queue.push(42).unwrap();
        });

        let popped = queue.pop_timeout(Duration::from_secs(5)).await;
        assert_eq!(popped, Some(42));
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_producers() {
        let queue: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::new("test"));

        let mut handles = Vec::new();
        for producer in 0..4u32 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25u32 {
                    queue.push(producer * 100 + i).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(queue.len(), 100);
        let mut drained = 0;
        while queue.try_pop().await.is_some() {
            drained += 1;
        }
        assert_eq!(drained, 100);
    }
}
