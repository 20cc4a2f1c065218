//! Kafka 适配器错误

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KafkaError {
    #[error("Kafka 配置错误: {0}")]
    Config(String),

    #[error("Kafka 生产者错误: {0}")]
    Producer(String),

    #[error("Kafka 消费者错误: {0}")]
    Consumer(String),
}

impl From<rdkafka::error::KafkaError> for KafkaError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        KafkaError::Producer(err.to_string())
    }
}

pub type KafkaResult<T> = Result<T, KafkaError>;
