use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::TaskMessage;

/// 任务成功发布后的通知事件, 携带信封全部字段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSentEvent {
    pub task_id: String,
    pub task_name: String,
    pub args: Vec<serde_json::Value>,
    pub kwargs: serde_json::Map<String, serde_json::Value>,
    pub retries: i32,
    pub eta: Option<DateTime<Utc>>,
    pub taskset_id: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl TaskSentEvent {
    pub fn from_message(message: &TaskMessage) -> Self {
        Self {
            task_id: message.task_id.clone(),
            task_name: message.task_name.clone(),
            args: message.args.clone(),
            kwargs: message.kwargs.clone(),
            retries: message.retries,
            eta: message.eta,
            taskset_id: message.taskset_id.clone(),
            sent_at: Utc::now(),
        }
    }
}

/// 进程内信号集线器
///
/// 通知交付是尽力而为: 没有订阅者或订阅者落后都不会阻塞或失败发布方,
/// 每次发布至多尝试投递一次。
#[derive(Clone)]
pub struct SignalHub {
    task_sent: broadcast::Sender<TaskSentEvent>,
}

impl SignalHub {
    pub fn new(capacity: usize) -> Self {
        let (task_sent, _) = broadcast::channel(capacity);
        Self { task_sent }
    }

    pub fn subscribe_task_sent(&self) -> broadcast::Receiver<TaskSentEvent> {
        self.task_sent.subscribe()
    }

    /// 广播任务已发送; 无订阅者时静默丢弃
    pub fn emit_task_sent(&self, message: &TaskMessage) {
        let _ = self.task_sent.send(TaskSentEvent::from_message(message));
    }
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new(64)
    }
}
