//! 异步事件发布器
//!
//! 两条相互独立的有界队列：领域事件（商品 + 通知）与统计事件各占一条，
//! 防止浏览/搜索洪峰挤占商品生命周期事件的工作协程。
//! 发布调用只在入队准入窗口内短暂等待，绝不因下游故障阻塞或报错。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use domain::{
    AnalyticsEvent, NotificationEvent, Product, ProductEvent, ProductEventKind,
};

use crate::broker::{
    EventBroker, ANALYTICS_EXCHANGE, NOTIFICATION_EXCHANGE, PRODUCT_EXCHANGE,
};

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub queue_capacity: usize,
    pub workers: usize,
    pub admission_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            workers: 4,
            admission_timeout: Duration::from_millis(50),
        }
    }
}

struct PublishJob {
    exchange: &'static str,
    routing_key: &'static str,
    /// 日志用的主体标识（商品 id、关键词等）
    subject: String,
    payload: Vec<u8>,
}

pub struct EventPublisher {
    domain_queue: mpsc::Sender<PublishJob>,
    analytics_queue: mpsc::Sender<PublishJob>,
    admission_timeout: Duration,
}

impl EventPublisher {
    pub fn new(broker: Arc<dyn EventBroker>, config: PublisherConfig) -> Self {
        let domain_queue = Self::spawn_pool("domain-events", Arc::clone(&broker), &config);
        let analytics_queue = Self::spawn_pool("analytics-events", broker, &config);
        Self {
            domain_queue,
            analytics_queue,
            admission_timeout: config.admission_timeout,
        }
    }

    /// 启动一个工作协程池，多个工作协程共享同一接收端
    fn spawn_pool(
        pool: &'static str,
        broker: Arc<dyn EventBroker>,
        config: &PublisherConfig,
    ) -> mpsc::Sender<PublishJob> {
        let (tx, rx) = mpsc::channel::<PublishJob>(config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..config.workers {
            let rx = Arc::clone(&rx);
            let broker = Arc::clone(&broker);
            tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else {
                        break;
                    };
                    match broker
                        .publish(job.exchange, job.routing_key, job.payload)
                        .await
                    {
                        Ok(()) => {
                            debug!(
                                pool,
                                worker,
                                routing_key = job.routing_key,
                                subject = %job.subject,
                                "事件已发布"
                            );
                        }
                        Err(err) => {
                            // 发布失败只记录，业务流程不回滚
                            error!(
                                pool,
                                worker,
                                routing_key = job.routing_key,
                                subject = %job.subject,
                                error = %err,
                                "事件发布失败，已丢弃"
                            );
                        }
                    }
                }
            });
        }
        tx
    }

    pub async fn publish_product(&self, kind: ProductEventKind, product: &Product) {
        let mut event = ProductEvent::from_product(kind, product);
        event.stamp();
        self.enqueue_product(event).await;
    }

    pub async fn publish_purchase(
        &self,
        product: &Product,
        buyer_id: i64,
        buyer_nickname: String,
    ) {
        let mut event = ProductEvent::from_product(ProductEventKind::Purchased, product)
            .with_purchase(buyer_id, buyer_nickname, product.price);
        event.stamp();
        self.enqueue_product(event).await;
    }

    pub async fn publish_notification(&self, mut event: NotificationEvent) {
        event.stamp();
        let subject = format!("product:{}", event.product_id);
        let routing_key = event.channel.routing_key();
        let Some(payload) = serialize(routing_key, &subject, &event) else {
            return;
        };
        self.enqueue(
            &self.domain_queue,
            PublishJob {
                exchange: NOTIFICATION_EXCHANGE,
                routing_key,
                subject,
                payload,
            },
        )
        .await;
    }

    pub async fn publish_analytics(&self, mut event: AnalyticsEvent) {
        event.stamp();
        let subject = event.subject();
        let routing_key = event.kind.routing_key();
        let Some(payload) = serialize(routing_key, &subject, &event) else {
            return;
        };
        self.enqueue(
            &self.analytics_queue,
            PublishJob {
                exchange: ANALYTICS_EXCHANGE,
                routing_key,
                subject,
                payload,
            },
        )
        .await;
    }

    async fn enqueue_product(&self, event: ProductEvent) {
        let subject = format!("product:{}", event.product_id);
        let routing_key = event.kind.routing_key();
        let Some(payload) = serialize(routing_key, &subject, &event) else {
            return;
        };
        self.enqueue(
            &self.domain_queue,
            PublishJob {
                exchange: PRODUCT_EXCHANGE,
                routing_key,
                subject,
                payload,
            },
        )
        .await;
    }

    /// 队列已满时在准入窗口内等待，超时则拒绝并告警，不做无界缓冲
    async fn enqueue(&self, queue: &mpsc::Sender<PublishJob>, job: PublishJob) {
        match queue.send_timeout(job, self.admission_timeout).await {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(job)) => {
                warn!(
                    routing_key = job.routing_key,
                    subject = %job.subject,
                    "发布队列已满，事件被拒绝"
                );
            }
            Err(SendTimeoutError::Closed(job)) => {
                warn!(
                    routing_key = job.routing_key,
                    subject = %job.subject,
                    "发布队列已关闭，事件被丢弃"
                );
            }
        }
    }
}

fn serialize<T: serde::Serialize>(
    routing_key: &str,
    subject: &str,
    event: &T,
) -> Option<Vec<u8>> {
    match serde_json::to_vec(event) {
        Ok(payload) => Some(payload),
        Err(err) => {
            error!(routing_key, subject, error = %err, "事件序列化失败");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerError, BrokerResult};
    use async_trait::async_trait;
    use domain::NewProduct;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn sample_product() -> Product {
        Product::new(
            1,
            "판매왕".to_string(),
            NewProduct {
                title: "Desk".to_string(),
                description: String::new(),
                price: 50_000,
                category: "기타".to_string(),
                image_url: None,
            },
        )
        .unwrap()
    }

    struct FailingBroker {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl EventBroker for FailingBroker {
        async fn publish(&self, _: &str, _: &str, _: Vec<u8>) -> BrokerResult<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(BrokerError::Connection("broker down".to_string()))
        }
    }

    struct StuckBroker;

    #[async_trait]
    impl EventBroker for StuckBroker {
        async fn publish(&self, _: &str, _: &str, _: Vec<u8>) -> BrokerResult<()> {
            futures::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn publish_returns_promptly_when_broker_fails() {
        let broker = Arc::new(FailingBroker {
            attempts: AtomicUsize::new(0),
        });
        let publisher = EventPublisher::new(broker.clone(), PublisherConfig::default());

        let started = Instant::now();
        publisher
            .publish_product(ProductEventKind::Created, &sample_product())
            .await;
        assert!(started.elapsed() < Duration::from_millis(200));

        // 工作协程吞掉了错误
        tokio::time::timeout(Duration::from_secs(1), async {
            while broker.attempts.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("worker should attempt the publish");
    }

    #[tokio::test]
    async fn saturated_queue_rejects_promptly() {
        let publisher = EventPublisher::new(
            Arc::new(StuckBroker),
            PublisherConfig {
                queue_capacity: 1,
                workers: 1,
                admission_timeout: Duration::from_millis(20),
            },
        );
        let product = sample_product();

        // 第一条被工作协程取走后卡死，第二条填满队列
        publisher
            .publish_product(ProductEventKind::Created, &product)
            .await;
        publisher
            .publish_product(ProductEventKind::Updated, &product)
            .await;

        let started = Instant::now();
        publisher
            .publish_product(ProductEventKind::Deleted, &product)
            .await;
        // 被拒绝而不是无限等待
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
