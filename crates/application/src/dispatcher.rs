//! 事件分发器
//!
//! 每个队列绑定一个处理入口，处理器之间完全隔离：任何处理器的失败
//! 只影响它自己的那条消息，不影响其他队列。反序列化失败的消息记录
//! 后直接丢弃，只做单次投递尝试。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, warn};

use domain::{
    AnalyticsEvent, AnalyticsEventKind, NotificationChannel, NotificationEvent,
    NotificationPriority, ProductEvent, ProductEventKind,
};

use crate::aggregate_store::{AggregateStore, CategoryNamespace};
use crate::broadcaster::{StreamBroadcaster, StreamEvent};
use crate::broker::{BrokerResult, QueueHandler};
use crate::ports::{InventorySync, NotificationGateway, SearchIndexSync};
use crate::publisher::EventPublisher;

pub struct DispatcherDependencies {
    pub publisher: Arc<EventPublisher>,
    pub store: Arc<AggregateStore>,
    pub gateway: Arc<dyn NotificationGateway>,
    pub search_index: Arc<dyn SearchIndexSync>,
    pub inventory: Arc<dyn InventorySync>,
    pub product_stream: Arc<StreamBroadcaster>,
}

pub struct EventDispatcher {
    publisher: Arc<EventPublisher>,
    store: Arc<AggregateStore>,
    gateway: Arc<dyn NotificationGateway>,
    search_index: Arc<dyn SearchIndexSync>,
    inventory: Arc<dyn InventorySync>,
    product_stream: Arc<StreamBroadcaster>,
}

impl EventDispatcher {
    pub fn new(deps: DispatcherDependencies) -> Arc<Self> {
        Arc::new(Self {
            publisher: deps.publisher,
            store: deps.store,
            gateway: deps.gateway,
            search_index: deps.search_index,
            inventory: deps.inventory,
            product_stream: deps.product_stream,
        })
    }

    pub async fn handle_product_event(&self, event: ProductEvent) {
        info!(
            product_id = event.product_id,
            event_type = event.kind.event_type(),
            "处理商品事件"
        );
        match event.kind {
            ProductEventKind::Created => {
                self.publisher
                    .publish_notification(new_product_notification(&event))
                    .await;
                self.sync_search_upsert(&event).await;
                self.broadcast_product(&event).await;
            }
            ProductEventKind::Updated => {
                self.publisher
                    .publish_notification(product_updated_notification(&event))
                    .await;
                self.sync_search_upsert(&event).await;
            }
            ProductEventKind::Deleted => {
                self.publisher
                    .publish_notification(product_deleted_notification(&event))
                    .await;
                if let Err(err) = self.search_index.remove(event.product_id).await {
                    warn!(product_id = event.product_id, error = %err, "搜索索引删除失败");
                }
            }
            ProductEventKind::Purchased => {
                for notification in purchase_notifications(&event) {
                    self.publisher.publish_notification(notification).await;
                }
                if let Err(err) = self.inventory.record_purchase(&event).await {
                    warn!(product_id = event.product_id, error = %err, "库存同步失败");
                }
            }
        }
    }

    pub async fn handle_notification(&self, event: NotificationEvent) {
        let result = match event.channel {
            NotificationChannel::Email => self.gateway.send_email(&event).await,
            NotificationChannel::Push => self.gateway.send_push(&event).await,
        };
        if let Err(err) = result {
            warn!(
                notification_id = %event.notification_id,
                channel = event.channel.routing_key(),
                product_id = event.product_id,
                error = %err,
                "通知投递失败"
            );
        }
    }

    pub async fn handle_analytics(&self, event: AnalyticsEvent) {
        match event.kind {
            AnalyticsEventKind::View => {
                if let Some(product_id) = event.product_id {
                    self.store.increment_view(product_id);
                }
                self.store
                    .increment_category(CategoryNamespace::View, &event.category);
            }
            AnalyticsEventKind::Search => {
                if let Some(keyword) = &event.keyword {
                    self.store.increment_search(keyword);
                }
                self.store
                    .increment_category(CategoryNamespace::Search, &event.category);
            }
        }
    }

    async fn sync_search_upsert(&self, event: &ProductEvent) {
        if let Err(err) = self.search_index.upsert(event).await {
            warn!(product_id = event.product_id, error = %err, "搜索索引同步失败");
        }
    }

    /// 新商品即时广播到商品实时流，不等待下一个周期推送
    async fn broadcast_product(&self, event: &ProductEvent) {
        self.product_stream
            .broadcast_now(&StreamEvent::new(
                "products",
                json!({
                    "id": event.product_id,
                    "title": event.title,
                    "price": event.price,
                    "category": event.category,
                    "sellerNickname": event.seller_nickname,
                    "imageUrl": event.image_url,
                }),
            ))
            .await;
    }
}

fn new_product_notification(event: &ProductEvent) -> NotificationEvent {
    NotificationEvent::new(
        NotificationChannel::Push,
        None,
        "새로운 상품이 등록되었습니다!",
        format!("{} - {}원", event.title, event.price),
        NotificationPriority::Medium,
        event.product_id,
        event.title.clone(),
        Some(event.price),
    )
}

fn product_updated_notification(event: &ProductEvent) -> NotificationEvent {
    NotificationEvent::new(
        NotificationChannel::Push,
        None,
        "관심 상품이 업데이트되었습니다!",
        format!("{} 상품 정보가 변경되었습니다", event.title),
        NotificationPriority::Medium,
        event.product_id,
        event.title.clone(),
        Some(event.price),
    )
}

fn product_deleted_notification(event: &ProductEvent) -> NotificationEvent {
    NotificationEvent::new(
        NotificationChannel::Push,
        None,
        "관심 상품이 삭제되었습니다",
        format!("{} 상품이 판매 중단되었습니다", event.title),
        NotificationPriority::Low,
        event.product_id,
        event.title.clone(),
        None,
    )
}

/// 成交后四路通知：买卖双方各收到推送与邮件
fn purchase_notifications(event: &ProductEvent) -> Vec<NotificationEvent> {
    let buyer_nickname = event
        .buyer_nickname
        .clone()
        .unwrap_or_else(|| "구매자".to_string());
    let seller = event.seller_id.to_string();
    let buyer = event.buyer_id.map(|id| id.to_string());
    let price = event.purchase_price.or(Some(event.price));

    let mut notifications = vec![
        NotificationEvent::new(
            NotificationChannel::Push,
            Some(seller.clone()),
            "상품이 판매되었습니다!",
            format!("{} 상품을 {}님이 구매했습니다", event.title, buyer_nickname),
            NotificationPriority::High,
            event.product_id,
            event.title.clone(),
            price,
        ),
        NotificationEvent::new(
            NotificationChannel::Email,
            Some(seller),
            "판매 완료 안내",
            format!("{} 상품 판매가 완료되었습니다", event.title),
            NotificationPriority::High,
            event.product_id,
            event.title.clone(),
            price,
        ),
    ];
    if let Some(buyer) = buyer {
        notifications.push(NotificationEvent::new(
            NotificationChannel::Push,
            Some(buyer.clone()),
            "구매가 완료되었습니다!",
            format!("{} 상품 구매가 완료되었습니다", event.title),
            NotificationPriority::High,
            event.product_id,
            event.title.clone(),
            price,
        ));
        notifications.push(NotificationEvent::new(
            NotificationChannel::Email,
            Some(buyer),
            "구매 완료 안내",
            format!("{} 상품 구매 내역입니다", event.title),
            NotificationPriority::Medium,
            event.product_id,
            event.title.clone(),
            price,
        ));
    }
    notifications
}

/// 商品事件队列入口
pub struct ProductEventQueue(pub Arc<EventDispatcher>);

#[async_trait]
impl QueueHandler for ProductEventQueue {
    async fn handle(&self, payload: &[u8]) -> BrokerResult<()> {
        match serde_json::from_slice::<ProductEvent>(payload) {
            Ok(event) => self.0.handle_product_event(event).await,
            Err(err) => {
                error!(error = %err, payload_len = payload.len(), "商品事件反序列化失败，消息已丢弃");
            }
        }
        Ok(())
    }
}

/// 通知队列入口
pub struct NotificationQueue(pub Arc<EventDispatcher>);

#[async_trait]
impl QueueHandler for NotificationQueue {
    async fn handle(&self, payload: &[u8]) -> BrokerResult<()> {
        match serde_json::from_slice::<NotificationEvent>(payload) {
            Ok(event) => self.0.handle_notification(event).await,
            Err(err) => {
                error!(error = %err, payload_len = payload.len(), "通知事件反序列化失败，消息已丢弃");
            }
        }
        Ok(())
    }
}

/// 统计队列入口
pub struct AnalyticsQueue(pub Arc<EventDispatcher>);

#[async_trait]
impl QueueHandler for AnalyticsQueue {
    async fn handle(&self, payload: &[u8]) -> BrokerResult<()> {
        match serde_json::from_slice::<AnalyticsEvent>(payload) {
            Ok(event) => self.0.handle_analytics(event).await,
            Err(err) => {
                error!(error = %err, payload_len = payload.len(), "统计事件反序列化失败，消息已丢弃");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::{SinkError, SnapshotSource, StreamConfig, SubscriberSink};
    use crate::broker::{BrokerResult as BR, EventBroker};
    use crate::ports::GatewayError;
    use crate::publisher::PublisherConfig;
    use domain::{AnalyticsContext, NewProduct, Product};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct EmptySource;

    #[async_trait]
    impl SnapshotSource for EmptySource {
        async fn snapshot(&self) -> StreamEvent {
            StreamEvent::new("products", serde_json::json!([]))
        }
    }

    /// 记录所有发布到代理的消息
    struct RecordingBroker {
        published: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl RecordingBroker {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                published: Mutex::new(Vec::new()),
            })
        }

        fn routed_to(&self, routing_key: &str) -> Vec<Vec<u8>> {
            self.published
                .lock()
                .unwrap()
                .iter()
                .filter(|(key, _)| key == routing_key)
                .map(|(_, payload)| payload.clone())
                .collect()
        }
    }

    #[async_trait]
    impl EventBroker for RecordingBroker {
        async fn publish(&self, _: &str, routing_key: &str, payload: Vec<u8>) -> BR<()> {
            self.published
                .lock()
                .unwrap()
                .push((routing_key.to_string(), payload));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingGateway {
        emails: AtomicUsize,
        pushes: AtomicUsize,
    }

    #[async_trait]
    impl NotificationGateway for RecordingGateway {
        async fn send_email(&self, _: &NotificationEvent) -> Result<(), GatewayError> {
            self.emails.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send_push(&self, _: &NotificationEvent) -> Result<(), GatewayError> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSearchIndex {
        upserts: AtomicUsize,
        removals: AtomicUsize,
    }

    #[async_trait]
    impl SearchIndexSync for RecordingSearchIndex {
        async fn upsert(&self, _: &ProductEvent) -> Result<(), GatewayError> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn remove(&self, _: i64) -> Result<(), GatewayError> {
            self.removals.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingInventory {
        purchases: AtomicUsize,
    }

    #[async_trait]
    impl InventorySync for RecordingInventory {
        async fn record_purchase(&self, _: &ProductEvent) -> Result<(), GatewayError> {
            self.purchases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CollectingSink {
        events: Mutex<Vec<StreamEvent>>,
    }

    impl SubscriberSink for CollectingSink {
        fn push(&self, event: &StreamEvent) -> Result<(), SinkError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Fixture {
        dispatcher: Arc<EventDispatcher>,
        broker: Arc<RecordingBroker>,
        store: Arc<AggregateStore>,
        gateway: Arc<RecordingGateway>,
        search_index: Arc<RecordingSearchIndex>,
        inventory: Arc<RecordingInventory>,
        product_stream: Arc<StreamBroadcaster>,
    }

    fn fixture() -> Fixture {
        let broker = RecordingBroker::new();
        let publisher = Arc::new(EventPublisher::new(
            broker.clone(),
            PublisherConfig::default(),
        ));
        let store = Arc::new(AggregateStore::new());
        let gateway = Arc::new(RecordingGateway::default());
        let search_index = Arc::new(RecordingSearchIndex::default());
        let inventory = Arc::new(RecordingInventory::default());
        let product_stream = StreamBroadcaster::new(
            "product-stream",
            Arc::new(EmptySource),
            StreamConfig {
                push_interval: Duration::from_secs(60),
                max_iterations: 120,
                max_failures: 3,
            },
        );
        let dispatcher = EventDispatcher::new(DispatcherDependencies {
            publisher,
            store: store.clone(),
            gateway: gateway.clone(),
            search_index: search_index.clone(),
            inventory: inventory.clone(),
            product_stream: product_stream.clone(),
        });
        Fixture {
            dispatcher,
            broker,
            store,
            gateway,
            search_index,
            inventory,
            product_stream,
        }
    }

    fn desk_product() -> Product {
        let mut product = Product::new(
            7,
            "판매왕".to_string(),
            NewProduct {
                title: "Desk".to_string(),
                description: "원목 책상".to_string(),
                price: 50_000,
                category: "기타".to_string(),
                image_url: None,
            },
        )
        .unwrap();
        product.id = 42;
        product
    }

    fn stamped(mut event: ProductEvent) -> ProductEvent {
        event.stamp();
        event
    }

    async fn wait_for<F>(mut predicate: F)
    where
        F: FnMut() -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !predicate() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn product_created_fans_out_notification_and_broadcast() {
        let fx = fixture();

        let sink = Arc::new(CollectingSink {
            events: Mutex::new(Vec::new()),
        });
        fx.product_stream.subscribe(sink.clone()).await;

        let event = stamped(ProductEvent::from_product(
            ProductEventKind::Created,
            &desk_product(),
        ));
        fx.dispatcher.handle_product_event(event).await;

        // 通知经发布器异步流出，轮询等待
        let broker = fx.broker.clone();
        wait_for(move || !broker.routed_to("notification.push").is_empty()).await;

        let payloads = fx.broker.routed_to("notification.push");
        let notification: NotificationEvent = serde_json::from_slice(&payloads[0]).unwrap();
        assert_eq!(notification.product_id, 42);
        assert!(notification.message.contains("Desk"));

        assert_eq!(fx.search_index.upserts.load(Ordering::SeqCst), 1);

        // 即时广播包含商品 42
        let events = sink.events.lock().unwrap().clone();
        let broadcast = events
            .iter()
            .find(|e| e.event == "products")
            .expect("broadcast frame");
        assert_eq!(broadcast.data["id"], 42);
    }

    #[tokio::test]
    async fn purchase_notifies_both_parties_and_syncs_inventory() {
        let fx = fixture();
        let event = stamped(
            ProductEvent::from_product(ProductEventKind::Purchased, &desk_product())
                .with_purchase(11, "구매자".to_string(), 50_000),
        );
        fx.dispatcher.handle_product_event(event).await;

        assert_eq!(fx.inventory.purchases.load(Ordering::SeqCst), 1);

        let broker = fx.broker.clone();
        wait_for(move || {
            broker.routed_to("notification.push").len() >= 2
                && broker.routed_to("notification.email").len() >= 2
        })
        .await;

        let mut push_recipients: Vec<Option<String>> = fx
            .broker
            .routed_to("notification.push")
            .iter()
            .map(|payload| {
                serde_json::from_slice::<NotificationEvent>(payload)
                    .unwrap()
                    .recipient
            })
            .collect();
        push_recipients.sort();
        assert_eq!(
            push_recipients,
            vec![Some("11".to_string()), Some("7".to_string())]
        );
    }

    #[tokio::test]
    async fn deleted_product_is_removed_from_search_index() {
        let fx = fixture();
        let event = stamped(ProductEvent::from_product(
            ProductEventKind::Deleted,
            &desk_product(),
        ));
        fx.dispatcher.handle_product_event(event).await;
        assert_eq!(fx.search_index.removals.load(Ordering::SeqCst), 1);
        assert_eq!(fx.search_index.upserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn notification_routes_to_matching_channel() {
        let fx = fixture();
        let mut push = NotificationEvent::new(
            NotificationChannel::Push,
            Some("7".to_string()),
            "t",
            "m",
            NotificationPriority::High,
            42,
            "Desk",
            None,
        );
        push.stamp();
        fx.dispatcher.handle_notification(push).await;
        assert_eq!(fx.gateway.pushes.load(Ordering::SeqCst), 1);
        assert_eq!(fx.gateway.emails.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn analytics_events_increment_store() {
        let fx = fixture();
        let mut view = AnalyticsEvent::view(
            42,
            "전자제품".to_string(),
            None,
            AnalyticsContext::default(),
        );
        view.stamp();
        fx.dispatcher.handle_analytics(view).await;

        let mut search = AnalyticsEvent::search(
            "책상".to_string(),
            "기타".to_string(),
            3,
            None,
            AnalyticsContext::default(),
        );
        search.stamp();
        fx.dispatcher.handle_analytics(search).await;

        assert_eq!(fx.store.view_count(42), 1);
        assert_eq!(fx.store.search_count("책상"), 1);
        assert_eq!(
            fx.store.category_count(CategoryNamespace::View, "전자제품"),
            1
        );
        assert_eq!(fx.store.category_count(CategoryNamespace::Search, "기타"), 1);
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped_without_error() {
        let fx = fixture();
        let queue = ProductEventQueue(fx.dispatcher.clone());
        let result = queue.handle(b"not-json").await;
        assert!(result.is_ok());
        assert!(fx.broker.routed_to("notification.push").is_empty());
    }
}
