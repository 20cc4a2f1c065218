//! 下游协作服务的 HTTP 网关
//!
//! 邮件、推送、搜索索引与库存四个下游共用同一个客户端。
//! 所有调用方都把失败当作尽力而为处理，这里只负责把错误如实返回。

use async_trait::async_trait;
use std::time::Duration;

use application::{GatewayError, InventorySync, NotificationGateway, SearchIndexSync};
use config::GatewayConfig;
use domain::{NotificationEvent, ProductEvent};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

pub struct HttpCollaboratorGateway {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl HttpCollaboratorGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, config }
    }

    async fn post_json<T: serde::Serialize>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<(), GatewayError> {
        self.http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| GatewayError(err.to_string()))?
            .error_for_status()
            .map_err(|err| GatewayError(err.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl NotificationGateway for HttpCollaboratorGateway {
    async fn send_email(&self, notification: &NotificationEvent) -> Result<(), GatewayError> {
        self.post_json(&self.config.email_url, notification).await
    }

    async fn send_push(&self, notification: &NotificationEvent) -> Result<(), GatewayError> {
        self.post_json(&self.config.push_url, notification).await
    }
}

#[async_trait]
impl SearchIndexSync for HttpCollaboratorGateway {
    async fn upsert(&self, event: &ProductEvent) -> Result<(), GatewayError> {
        self.post_json(&self.config.search_index_url, event).await
    }

    async fn remove(&self, product_id: i64) -> Result<(), GatewayError> {
        self.http
            .delete(format!("{}/{}", self.config.search_index_url, product_id))
            .send()
            .await
            .map_err(|err| GatewayError(err.to_string()))?
            .error_for_status()
            .map_err(|err| GatewayError(err.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl InventorySync for HttpCollaboratorGateway {
    async fn record_purchase(&self, event: &ProductEvent) -> Result<(), GatewayError> {
        self.post_json(&self.config.inventory_url, event).await
    }
}
