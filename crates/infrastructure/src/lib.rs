//! 基础设施层
//!
//! Kafka 消息代理适配器、Postgres 仓储实现、JWT 解码器、远程身份
//! 客户端以及下游协作服务的 HTTP 网关。

pub mod db;
pub mod gateway;
pub mod identity;
pub mod kafka;
pub mod storage;

pub use db::{create_pg_pool, PgProductRepository, PgPurchaseRepository};
pub use gateway::HttpCollaboratorGateway;
pub use identity::{HttpIdentityClient, JwtTokenDecoder};
pub use kafka::{KafkaError, KafkaEventProducer, KafkaQueueConsumer, KafkaResult};
pub use storage::LocalFileStorage;
