//! 应用层：事件管线与用例服务
//!
//! 核心组件：
//! - [`EventPublisher`]：两条有界队列 + 工作协程池的异步发布器
//! - [`EventDispatcher`]：每个队列一个处理器，彼此隔离
//! - [`AggregateStore`]：进程内原子计数器
//! - [`StreamBroadcaster`]：SSE 订阅注册表与推送循环
//! - [`IdentityResolver`]：令牌指纹缓存 + 本地解码 + 远程回退

pub mod aggregate_store;
pub mod broadcaster;
pub mod broker;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod ports;
pub mod publisher;
pub mod services;

pub use aggregate_store::{AggregateStore, CategoryNamespace, KeywordCount, StoreTotals};
pub use broadcaster::{
    SinkError, SnapshotSource, StreamBroadcaster, StreamConfig, StreamEvent, SubscriberSink,
    SubscriptionState,
};
pub use broker::{
    BrokerError, BrokerResult, EventBroker, QueueHandler, ANALYTICS_EXCHANGE,
    NOTIFICATION_EXCHANGE, PRODUCT_EXCHANGE,
};
pub use dispatcher::{
    AnalyticsQueue, DispatcherDependencies, EventDispatcher, NotificationQueue, ProductEventQueue,
};
pub use error::ApplicationError;
pub use identity::{
    Identity, IdentityCacheConfig, IdentityClient, IdentityError, IdentityResolver, TokenDecoder,
};
pub use ports::{
    FileStorage, GatewayError, InventorySync, NotificationGateway, SearchIndexSync,
};
pub use publisher::{EventPublisher, PublisherConfig};
pub use services::{AnalyticsService, ProductService};
