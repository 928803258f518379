use thiserror::Error;

/// 调度核心错误类型定义
#[derive(Debug, Error)]
pub enum ConveyorError {
    #[error("传输层错误: {0}")]
    Transport(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("队列已关闭: {0}")]
    QueueClosed(String),

    #[error("任务执行错误: {0}")]
    ExecutionFailed(String),

    #[error("未注册的任务: {name}")]
    UnknownTask { name: String },

    #[error("无效的调度表达式: {expr} - {message}")]
    InvalidSchedule { expr: String, message: String },

    #[error("任务标识冲突: {id}")]
    IdentityCollision { id: String },

    #[error("无效的任务参数: {0}")]
    InvalidTaskParams(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl ConveyorError {
    pub fn transport_error(message: impl Into<String>) -> Self {
        ConveyorError::Transport(message.into())
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        ConveyorError::Configuration(message.into())
    }

    pub fn execution_error(message: impl Into<String>) -> Self {
        ConveyorError::ExecutionFailed(message.into())
    }

    /// 是否为传输边界错误(发布或消费失败)
    pub fn is_transport_error(&self) -> bool {
        matches!(self, ConveyorError::Transport(_))
    }

    /// 是否为调度循环内部故障(迭代体内抛出且未被局部捕获的错误)
    pub fn is_scheduling_fault(&self) -> bool {
        matches!(
            self,
            ConveyorError::ExecutionFailed(_)
                | ConveyorError::UnknownTask { .. }
                | ConveyorError::QueueClosed(_)
                | ConveyorError::InvalidSchedule { .. }
                | ConveyorError::Internal(_)
        )
    }
}

impl From<serde_json::Error> for ConveyorError {
    fn from(err: serde_json::Error) -> Self {
        ConveyorError::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, ConveyorError>;
