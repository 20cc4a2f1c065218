//! Kafka 事件生产者

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tracing::{debug, warn};

use application::{BrokerError, BrokerResult, EventBroker};
use config::BrokerConfig;

use super::error::{KafkaError, KafkaResult};

pub struct KafkaEventProducer {
    producer: FutureProducer,
    send_timeout: Duration,
    send_retries: u32,
}

impl KafkaEventProducer {
    pub fn new(config: &BrokerConfig) -> KafkaResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", config.send_timeout_ms.to_string())
            .set("acks", "all")
            .set("compression.type", "snappy")
            .set("enable.idempotence", "true")
            .create()
            .map_err(|err| KafkaError::Config(err.to_string()))?;

        Ok(Self {
            producer,
            send_timeout: Duration::from_millis(config.send_timeout_ms),
            send_retries: config.send_retries,
        })
    }
}

#[async_trait]
impl EventBroker for KafkaEventProducer {
    /// 路由键即主题名，消息键也取路由键保证同一队列内有序
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> BrokerResult<()> {
        let mut last_error = String::new();
        for attempt in 0..=self.send_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                warn!(
                    exchange,
                    routing_key, attempt, backoff_ms = backoff.as_millis() as u64,
                    "发送失败，退避后重试"
                );
                tokio::time::sleep(backoff).await;
            }

            let record = FutureRecord::to(routing_key)
                .key(routing_key)
                .payload(&payload);
            match self
                .producer
                .send(record, Timeout::After(self.send_timeout))
                .await
            {
                Ok(rdkafka::producer::future_producer::Delivery {
                    partition, offset, ..
                }) => {
                    debug!(exchange, routing_key, partition, offset, "消息已发送");
                    return Ok(());
                }
                Err((err, _)) => {
                    last_error = err.to_string();
                }
            }
        }
        Err(BrokerError::Publish(format!(
            "{routing_key}: {last_error}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BrokerConfig {
        BrokerConfig {
            brokers: "localhost:9092".to_string(),
            consumer_group_prefix: "market-test".to_string(),
            send_timeout_ms: 3000,
            send_retries: 1,
        }
    }

    #[test]
    fn producer_builds_from_config() {
        // 创建生产者不需要真实的 broker 连接
        let producer = KafkaEventProducer::new(&test_config());
        assert!(producer.is_ok());
    }

    #[tokio::test]
    async fn publish_round_trip_against_local_broker() {
        if std::env::var("KAFKA_INTEGRATION_TEST").is_err() {
            eprintln!("跳过 Kafka 集成测试（设置 KAFKA_INTEGRATION_TEST 启用）");
            return;
        }

        let producer = KafkaEventProducer::new(&test_config()).unwrap();
        let result = producer
            .publish(
                "product.exchange",
                "product.created",
                br#"{"probe":true}"#.to_vec(),
            )
            .await;
        assert!(result.is_ok());
    }
}
