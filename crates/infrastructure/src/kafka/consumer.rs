//! Kafka 队列消费者
//!
//! 每个路由键一个消费组，消费循环独立运行。处理器返回的错误只记录
//! 日志，不触发重投递；auto-commit 之前崩溃的消息会被重新投递，
//! 整体保证至少一次语义。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::Message;
use tracing::{error, info, warn};

use application::QueueHandler;
use config::BrokerConfig;

use super::error::{KafkaError, KafkaResult};

const MAX_RECEIVE_RETRIES: u32 = 5;

pub struct KafkaQueueConsumer {
    queue: String,
    shutdown: Arc<AtomicBool>,
}

impl KafkaQueueConsumer {
    /// 创建消费者并立即启动消费循环
    pub fn spawn(
        config: &BrokerConfig,
        routing_key: &str,
        handler: Arc<dyn QueueHandler>,
    ) -> KafkaResult<Self> {
        let group_id = format!("{}.{}", config.consumer_group_prefix, routing_key);
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|err| KafkaError::Config(err.to_string()))?;

        consumer
            .subscribe(&[routing_key])
            .map_err(|err| KafkaError::Consumer(err.to_string()))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let queue = routing_key.to_string();

        let loop_queue = queue.clone();
        let loop_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            consume_loop(consumer, loop_queue, handler, loop_shutdown).await;
        });

        info!(queue = routing_key, group = %group_id, "队列消费者已启动");
        Ok(Self { queue, shutdown })
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        info!(queue = %self.queue, "队列消费者收到停机信号");
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::SeqCst)
    }
}

impl Drop for KafkaQueueConsumer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

async fn consume_loop(
    consumer: StreamConsumer,
    queue: String,
    handler: Arc<dyn QueueHandler>,
    shutdown: Arc<AtomicBool>,
) {
    let mut receive_failures: u32 = 0;

    while !shutdown.load(Ordering::SeqCst) {
        match consumer.recv().await {
            Ok(message) => {
                receive_failures = 0;
                let Some(payload) = message.payload() else {
                    warn!(queue = %queue, "收到空消息，已跳过");
                    continue;
                };
                // 单次尝试，处理失败不重投递
                if let Err(err) = handler.handle(payload).await {
                    error!(
                        queue = %queue,
                        error = %err,
                        payload_len = payload.len(),
                        "消息处理失败，已丢弃"
                    );
                }
            }
            Err(err) => {
                receive_failures += 1;
                if receive_failures > MAX_RECEIVE_RETRIES {
                    error!(queue = %queue, error = %err, "连续接收失败，消费循环退出");
                    break;
                }
                let backoff = Duration::from_millis(500 * u64::from(receive_failures));
                warn!(
                    queue = %queue,
                    error = %err,
                    retry = receive_failures,
                    "接收消息失败，退避后重试"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
    info!(queue = %queue, "消费循环已结束");
}
