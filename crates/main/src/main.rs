//! 服务入口：配置加载、依赖装配与启动

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use application::{
    AggregateStore, AnalyticsQueue, AnalyticsService, DispatcherDependencies, EventDispatcher,
    EventPublisher, IdentityCacheConfig, IdentityResolver, NotificationQueue, ProductEventQueue,
    ProductService, PublisherConfig, QueueHandler, StreamBroadcaster, StreamConfig,
};
use application::services::{AnalyticsServiceDependencies, ProductServiceDependencies};
use domain::{AnalyticsEventKind, NotificationChannel, ProductEventKind};
use infrastructure::{
    create_pg_pool, HttpCollaboratorGateway, HttpIdentityClient, JwtTokenDecoder,
    KafkaEventProducer, KafkaQueueConsumer, LocalFileStorage, PgProductRepository,
    PgPurchaseRepository,
};
use web_api::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::AppConfig::from_env_with_defaults().context("加载配置失败")?;
    info!(host = %config.server.host, port = config.server.port, "配置加载完成");

    // 数据库
    let pool = create_pg_pool(&config.database.url, config.database.max_connections)
        .await
        .context("数据库连接失败")?;
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("数据库迁移失败")?;

    let products: Arc<dyn domain::ProductRepository> =
        Arc::new(PgProductRepository::new(pool.clone()));
    let purchases: Arc<dyn domain::PurchaseRepository> =
        Arc::new(PgPurchaseRepository::new(pool.clone()));

    // 消息代理与发布器
    let broker = Arc::new(KafkaEventProducer::new(&config.broker).context("创建生产者失败")?);
    let publisher = Arc::new(EventPublisher::new(
        broker,
        PublisherConfig {
            queue_capacity: config.publisher.queue_capacity,
            workers: config.publisher.workers,
            admission_timeout: Duration::from_millis(config.publisher.admission_timeout_ms),
        },
    ));

    // 身份解析
    let identity = Arc::new(IdentityResolver::new(
        Arc::new(JwtTokenDecoder::new(&config.jwt.secret)),
        Arc::new(HttpIdentityClient::new(config.identity.service_url.clone())),
        IdentityCacheConfig {
            ttl: Duration::from_secs(config.identity.cache_ttl_secs),
            sweep_threshold: config.identity.cache_sweep_threshold,
        },
    ));

    // 用例服务
    let store = Arc::new(AggregateStore::new());
    let storage = Arc::new(LocalFileStorage::new(
        config.storage.root_dir.clone(),
        config.storage.public_base.clone(),
    ));
    let product_service = ProductService::new(ProductServiceDependencies {
        products: products.clone(),
        purchases,
        identity,
        publisher: publisher.clone(),
        storage,
    });
    let analytics_service = AnalyticsService::new(AnalyticsServiceDependencies {
        store: store.clone(),
        products,
        publisher: publisher.clone(),
    });

    // 实时流
    let stream_config = StreamConfig {
        push_interval: Duration::from_secs(config.stream.push_interval_secs),
        max_iterations: config.stream.max_iterations,
        max_failures: config.stream.max_failures,
    };
    let product_stream = StreamBroadcaster::new(
        "product-stream",
        product_service.clone(),
        stream_config.clone(),
    );
    let analytics_stream = StreamBroadcaster::new(
        "analytics-stream",
        analytics_service.clone(),
        stream_config,
    );

    // 事件分发与队列消费者
    let gateway = Arc::new(HttpCollaboratorGateway::new(config.gateway.clone()));
    let dispatcher = EventDispatcher::new(DispatcherDependencies {
        publisher,
        store,
        gateway: gateway.clone(),
        search_index: gateway.clone(),
        inventory: gateway,
        product_stream: product_stream.clone(),
    });

    let mut consumers: Vec<KafkaQueueConsumer> = Vec::new();
    for kind in ProductEventKind::all() {
        let handler: Arc<dyn QueueHandler> = Arc::new(ProductEventQueue(dispatcher.clone()));
        consumers.push(
            KafkaQueueConsumer::spawn(&config.broker, kind.routing_key(), handler)
                .context("启动商品队列消费者失败")?,
        );
    }
    for channel in NotificationChannel::all() {
        let handler: Arc<dyn QueueHandler> = Arc::new(NotificationQueue(dispatcher.clone()));
        consumers.push(
            KafkaQueueConsumer::spawn(&config.broker, channel.routing_key(), handler)
                .context("启动通知队列消费者失败")?,
        );
    }
    for kind in AnalyticsEventKind::all() {
        let handler: Arc<dyn QueueHandler> = Arc::new(AnalyticsQueue(dispatcher.clone()));
        consumers.push(
            KafkaQueueConsumer::spawn(&config.broker, kind.routing_key(), handler)
                .context("启动统计队列消费者失败")?,
        );
    }
    info!(consumers = consumers.len(), "队列消费者已全部启动");

    // HTTP 服务
    let state = AppState {
        products: product_service,
        analytics: analytics_service,
        product_stream,
        analytics_stream,
    };
    let app = web_api::router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("监听 {addr} 失败"))?;
    info!(%addr, "服务已启动");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP 服务异常退出")?;

    for consumer in &consumers {
        consumer.shutdown();
    }
    info!("服务已退出");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("安装 Ctrl-C 信号处理失败");
    }
}
