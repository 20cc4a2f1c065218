//! 下游协作服务端口
//!
//! 所有调用都是尽力而为：失败由调用方记录日志后忽略，不影响主流程。

use async_trait::async_trait;
use thiserror::Error;

use domain::{NotificationEvent, ProductEvent};

#[derive(Debug, Error)]
#[error("外部服务调用失败: {0}")]
pub struct GatewayError(pub String);

/// 邮件与推送投递出口
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send_email(&self, notification: &NotificationEvent) -> Result<(), GatewayError>;

    async fn send_push(&self, notification: &NotificationEvent) -> Result<(), GatewayError>;
}

/// 搜索索引同步出口
#[async_trait]
pub trait SearchIndexSync: Send + Sync {
    async fn upsert(&self, event: &ProductEvent) -> Result<(), GatewayError>;

    async fn remove(&self, product_id: i64) -> Result<(), GatewayError>;
}

/// 库存系统同步出口
#[async_trait]
pub trait InventorySync: Send + Sync {
    async fn record_purchase(&self, event: &ProductEvent) -> Result<(), GatewayError>;
}

/// 商品图片存储出口
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// 存储成功后返回可公开访问的 URL
    async fn store(&self, bytes: Vec<u8>, original_name: &str) -> Result<String, GatewayError>;
}
