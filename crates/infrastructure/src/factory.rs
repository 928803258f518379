use std::sync::Arc;

use tracing::info;

use conveyor_core::{Result, Transport, TransportConfig, TransportType};

use crate::amqp::AmqpTransport;
use crate::memory::MemoryTransport;

/// 按配置创建传输层实例
pub struct TransportFactory;

impl TransportFactory {
    pub async fn create(config: &TransportConfig) -> Result<Arc<dyn Transport>> {
        config.validate()?;

        match config.r#type {
            TransportType::Amqp => {
                info!("使用RabbitMQ传输层: {}", config.url);
                let transport = AmqpTransport::new(config.clone()).await?;
                Ok(Arc::new(transport))
            }
            TransportType::InMemory => {
                info!("使用内存传输层");
                Ok(Arc::new(MemoryTransport::new()))
            }
        }
    }
}
