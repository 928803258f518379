use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    ExchangeKind,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use conveyor_core::{ConveyorError, Result, SendOptions, TaskMessage, Transport, TransportConfig};

/// RabbitMQ传输层实现
///
/// 构造时连接broker, 声明配置的exchange与持久化消费队列并完成绑定;
/// 发送走publisher confirm, 拉取走basic_get单条轮询。
pub struct AmqpTransport {
    connection: Connection,
    channel: Arc<Mutex<Channel>>,
    config: TransportConfig,
}

impl AmqpTransport {
    /// 连接RabbitMQ并初始化broker拓扑
    pub async fn new(config: TransportConfig) -> Result<Self> {
        let connect_timeout = Duration::from_secs(config.connection_timeout_seconds);
        let connection = tokio::time::timeout(
            connect_timeout,
            Connection::connect(&config.url, ConnectionProperties::default()),
        )
        .await
        .map_err(|_| {
            ConveyorError::transport_error(format!(
                "连接RabbitMQ超时({}秒)",
                config.connection_timeout_seconds
            ))
        })?
        .map_err(|e| ConveyorError::transport_error(format!("连接RabbitMQ失败: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| ConveyorError::transport_error(format!("创建通道失败: {e}")))?;

        info!("成功连接到RabbitMQ: {}", config.url);

        let transport = Self {
            connection,
            channel: Arc::new(Mutex::new(channel)),
            config,
        };
        transport.declare_topology().await?;

        Ok(transport)
    }

    /// 声明exchange和消费队列并绑定
    async fn declare_topology(&self) -> Result<()> {
        let channel = self.channel.lock().await;

        channel
            .exchange_declare(
                &self.config.exchange,
                exchange_kind(&self.config.exchange_type)?,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                ConveyorError::transport_error(format!(
                    "声明exchange {} 失败: {e}",
                    self.config.exchange
                ))
            })?;

        channel
            .queue_declare(
                &self.config.consumer_queue,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                ConveyorError::transport_error(format!(
                    "声明队列 {} 失败: {e}",
                    self.config.consumer_queue
                ))
            })?;

        channel
            .queue_bind(
                &self.config.consumer_queue,
                &self.config.exchange,
                &self.config.consumer_routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                ConveyorError::transport_error(format!(
                    "绑定队列 {} 失败: {e}",
                    self.config.consumer_queue
                ))
            })?;

        debug!(
            "Declared exchange {} ({}) and bound queue {} with key {}",
            self.config.exchange,
            self.config.exchange_type,
            self.config.consumer_queue,
            self.config.consumer_routing_key
        );
        Ok(())
    }

    fn serialize_message(&self, message: &TaskMessage, options: &SendOptions) -> Result<Vec<u8>> {
        let serializer = options
            .serializer
            .as_deref()
            .unwrap_or(&self.config.serializer);
        if serializer != "json" {
            return Err(ConveyorError::Serialization(format!(
                "不支持的序列化标识: {serializer}"
            )));
        }
        message
            .serialize_bytes()
            .map_err(|e| ConveyorError::Serialization(format!("序列化任务信封失败: {e}")))
    }

    /// 关闭连接
    pub async fn close(&self) -> Result<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| ConveyorError::transport_error(format!("关闭连接失败: {e}")))?;

        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}

#[async_trait]
impl Transport for AmqpTransport {
    async fn send(&self, message: &TaskMessage, options: &SendOptions) -> Result<()> {
        let payload = self.serialize_message(message, options)?;
        let routing_key = options
            .routing_key
            .as_deref()
            .unwrap_or(&self.config.publisher_routing_key);

        let mut properties = BasicProperties::default().with_delivery_mode(2); // 2 = persistent
        if let Some(priority) = options.priority {
            properties = properties.with_priority(priority);
        }

        let channel = self.channel.lock().await;
        let confirm = channel
            .basic_publish(
                &self.config.exchange,
                routing_key,
                BasicPublishOptions {
                    mandatory: options.mandatory,
                    immediate: options.immediate,
                },
                &payload,
                properties,
            )
            .await
            .map_err(|e| {
                ConveyorError::transport_error(format!("发布任务到 {routing_key} 失败: {e}"))
            })?;

        confirm
            .await
            .map_err(|e| ConveyorError::transport_error(format!("消息发布确认失败: {e}")))?;

        debug!(
            "Task {}[{}] published to exchange {} with key {}",
            message.task_name, message.task_id, self.config.exchange, routing_key
        );
        Ok(())
    }

    async fn fetch(&self) -> Result<Option<TaskMessage>> {
        let channel = self.channel.lock().await;
        let get_result = channel
            .basic_get(&self.config.consumer_queue, BasicGetOptions::default())
            .await;

        match get_result {
            Ok(Some(delivery)) => {
                let message = TaskMessage::deserialize_bytes(&delivery.data)
                    .map_err(|e| ConveyorError::Serialization(format!("反序列化任务失败: {e}")))?;
                channel
                    .basic_ack(delivery.delivery_tag, BasicAckOptions::default())
                    .await
                    .map_err(|e| ConveyorError::transport_error(format!("确认消息失败: {e}")))?;

                debug!("Fetched task {} from {}", message.task_id, self.config.consumer_queue);
                Ok(Some(message))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                // 队列不存在时按空队列处理
                let error_msg = e.to_string();
                if error_msg.contains("NOT_FOUND") || error_msg.contains("404") {
                    debug!("Queue {} does not exist yet", self.config.consumer_queue);
                    Ok(None)
                } else {
                    Err(ConveyorError::transport_error(format!(
                        "从队列 {} 获取消息失败: {e}",
                        self.config.consumer_queue
                    )))
                }
            }
        }
    }
}

fn exchange_kind(exchange_type: &str) -> Result<ExchangeKind> {
    match exchange_type {
        "direct" => Ok(ExchangeKind::Direct),
        "topic" => Ok(ExchangeKind::Topic),
        "fanout" => Ok(ExchangeKind::Fanout),
        other => Err(ConveyorError::config_error(format!(
            "不支持的exchange类型: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_kind_mapping() {
        assert!(matches!(exchange_kind("direct"), Ok(ExchangeKind::Direct)));
        assert!(matches!(exchange_kind("topic"), Ok(ExchangeKind::Topic)));
        assert!(matches!(exchange_kind("fanout"), Ok(ExchangeKind::Fanout)));
        assert!(exchange_kind("headers").is_err());
    }
}
