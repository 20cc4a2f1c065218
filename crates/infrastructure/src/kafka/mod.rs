//! Kafka 消息代理适配器
//!
//! 路由键直接作为主题名使用，每个队列对应一个独立消费组，
//! 交换机名称只进入日志。

pub mod consumer;
pub mod error;
pub mod producer;

pub use consumer::KafkaQueueConsumer;
pub use error::{KafkaError, KafkaResult};
pub use producer::KafkaEventProducer;
