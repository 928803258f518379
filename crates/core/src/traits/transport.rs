use async_trait::async_trait;

use crate::errors::Result;
use crate::models::TaskMessage;

/// 传输层发送选项, 对应AMQP投递语义, 其余传输实现可忽略不适用的项
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// 要求broker保证消息可路由, 路由失败即报错
    pub mandatory: bool,
    /// 无消费者在线时立即失败
    pub immediate: bool,
    /// 投递优先级提示
    pub priority: Option<u8>,
    /// 覆盖默认路由键
    pub routing_key: Option<String>,
    /// 覆盖默认载荷编码标识
    pub serializer: Option<String>,
}

/// 任务消息传输层抽象
///
/// 发送是即发即弃, 失败以传输层错误抛给调用方; 拉取是非阻塞单条轮询。
#[async_trait]
pub trait Transport: Send + Sync {
    /// 将任务信封发布到传输层
    async fn send(&self, message: &TaskMessage, options: &SendOptions) -> Result<()>;

    /// 从传输层拉取至多一条任务消息, 无消息时返回None
    async fn fetch(&self) -> Result<Option<TaskMessage>>;
}
