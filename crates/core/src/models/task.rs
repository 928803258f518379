use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 生成全局唯一的任务标识
pub fn generate_task_id() -> String {
    Uuid::new_v4().to_string()
}

/// 放置到传输层上的任务信封
///
/// 线上编码使用简短字段名(task/id/args/kwargs/retries/eta/taskset),
/// eta规范化为RFC 3339时间戳, taskset缺省时不出现在线上。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    #[serde(rename = "task")]
    pub task_name: String,
    #[serde(rename = "id")]
    pub task_id: String,
    pub args: Vec<serde_json::Value>,
    pub kwargs: serde_json::Map<String, serde_json::Value>,
    pub retries: i32,
    #[serde(default)]
    pub eta: Option<DateTime<Utc>>,
    #[serde(rename = "taskset", default, skip_serializing_if = "Option::is_none")]
    pub taskset_id: Option<String>,
}

impl TaskMessage {
    /// 创建一个新信封, 自动分配唯一task_id
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            task_id: generate_task_id(),
            args: Vec::new(),
            kwargs: serde_json::Map::new(),
            retries: 0,
            eta: None,
            taskset_id: None,
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }

    pub fn with_args(mut self, args: Vec<serde_json::Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: serde_json::Map<String, serde_json::Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn with_retries(mut self, retries: i32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_eta(mut self, eta: DateTime<Utc>) -> Self {
        self.eta = Some(eta);
        self
    }

    pub fn with_taskset_id(mut self, taskset_id: impl Into<String>) -> Self {
        self.taskset_id = Some(taskset_id.into());
        self
    }

    /// 任务此刻是否可以立即执行(无eta或eta已过)
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        match self.eta {
            None => true,
            Some(eta) => eta <= now,
        }
    }

    /// 派生重试信封: 重试计数加一, 按倒计时设置新的eta
    ///
    /// task_id保持不变; 需要新标识的调用方自行链式调用with_task_id。
    pub fn for_retry(&self, countdown: Duration) -> Self {
        let mut message = self.clone();
        message.retries += 1;
        message.eta = Some(Utc::now() + countdown);
        message
    }

    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn deserialize(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn serialize_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn deserialize_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// 等待到期的持有条目
#[derive(Debug, Clone)]
pub struct HoldEntry {
    pub task: TaskMessage,
    pub eligible_at: DateTime<Utc>,
}

impl HoldEntry {
    pub fn new(task: TaskMessage, eligible_at: DateTime<Utc>) -> Self {
        Self { task, eligible_at }
    }

    /// 条目是否已到期, 可以晋升到就绪队列
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.eligible_at
    }
}
