//! 消息代理端口
//!
//! 发布端口与消费端口都定义在应用层，Kafka 适配器位于基础设施层。
//! 路由键即主题名；交换机名称只作为日志上下文保留。

use async_trait::async_trait;
use thiserror::Error;

pub const PRODUCT_EXCHANGE: &str = "product.exchange";
pub const NOTIFICATION_EXCHANGE: &str = "notification.exchange";
pub const ANALYTICS_EXCHANGE: &str = "analytics.exchange";

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("消息代理连接错误: {0}")]
    Connection(String),

    #[error("消息发布失败: {0}")]
    Publish(String),

    #[error("消息序列化失败: {0}")]
    Serialization(String),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// 事件发布端口
#[async_trait]
pub trait EventBroker: Send + Sync {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> BrokerResult<()>;
}

/// 队列消息处理端口。每条消息只尝试一次，失败由实现方记录日志。
#[async_trait]
pub trait QueueHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> BrokerResult<()>;
}
