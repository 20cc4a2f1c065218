//! 实时流广播器
//!
//! 每个订阅者注册进 `RwLock<HashMap>` 注册表并获得一个独立推送循环：
//! 按固定间隔从快照源取数据推送，命中迭代上限、连续失败上限或注册表
//! 中已不存在时退出。任何订阅者的失败都不会影响其他订阅者。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 推送给订阅者的一帧数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamEvent {
    pub event: String,
    pub data: serde_json::Value,
}

impl StreamEvent {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    fn connection_ack(subscription_id: Uuid) -> Self {
        Self::new(
            "connected",
            serde_json::json!({ "subscription_id": subscription_id }),
        )
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SinkError {
    #[error("订阅方已断开")]
    Closed,

    #[error("推送失败: {0}")]
    Failed(String),
}

/// 订阅者出口。推送必须立即成功或立即失败，不允许阻塞推送循环。
pub trait SubscriberSink: Send + Sync {
    fn push(&self, event: &StreamEvent) -> Result<(), SinkError>;
}

/// 周期推送的数据快照来源
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self) -> StreamEvent;
}

/// 订阅生命周期的终止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// 注册表中已被移除（主动退订或广播清理）
    Completed,
    /// 迭代次数达到上限
    TimedOut,
    /// 连续推送失败达到上限
    Errored,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub push_interval: Duration,
    pub max_iterations: u32,
    pub max_failures: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            push_interval: Duration::from_secs(5),
            max_iterations: 120,
            max_failures: 3,
        }
    }
}

struct StreamSubscription {
    id: Uuid,
    registered_at: DateTime<Utc>,
    sink: Arc<dyn SubscriberSink>,
}

pub struct StreamBroadcaster {
    name: &'static str,
    registry: RwLock<HashMap<Uuid, Arc<StreamSubscription>>>,
    source: Arc<dyn SnapshotSource>,
    config: StreamConfig,
}

impl StreamBroadcaster {
    pub fn new(
        name: &'static str,
        source: Arc<dyn SnapshotSource>,
        config: StreamConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            registry: RwLock::new(HashMap::new()),
            source,
            config,
        })
    }

    /// 注册订阅者：同步推送连接确认，然后启动独立推送循环。
    /// 连接确认失败说明订阅方立刻就断了，直接不启动循环。
    pub async fn subscribe(self: &Arc<Self>, sink: Arc<dyn SubscriberSink>) -> Uuid {
        let id = Uuid::new_v4();
        let subscription = Arc::new(StreamSubscription {
            id,
            registered_at: Utc::now(),
            sink,
        });

        self.registry
            .write()
            .await
            .insert(id, Arc::clone(&subscription));
        info!(stream = self.name, subscription = %id, "新增订阅");

        if let Err(err) = subscription.sink.push(&StreamEvent::connection_ack(id)) {
            warn!(stream = self.name, subscription = %id, error = %err, "连接确认推送失败");
            self.remove(id).await;
            return id;
        }

        let broadcaster = Arc::clone(self);
        tokio::spawn(async move {
            broadcaster.push_loop(subscription).await;
        });
        id
    }

    async fn push_loop(&self, subscription: Arc<StreamSubscription>) {
        let mut failures: u32 = 0;
        let mut iterations: u32 = 0;

        let final_state = loop {
            tokio::time::sleep(self.config.push_interval).await;

            if !self.contains(subscription.id).await {
                break SubscriptionState::Completed;
            }
            if iterations >= self.config.max_iterations {
                break SubscriptionState::TimedOut;
            }
            iterations += 1;

            let event = self.source.snapshot().await;
            match subscription.sink.push(&event) {
                Ok(()) => {
                    failures = 0;
                }
                Err(err) => {
                    failures += 1;
                    warn!(
                        stream = self.name,
                        subscription = %subscription.id,
                        failures,
                        error = %err,
                        "周期推送失败"
                    );
                    if failures >= self.config.max_failures {
                        break SubscriptionState::Errored;
                    }
                }
            }
        };

        self.remove(subscription.id).await;
        info!(
            stream = self.name,
            subscription = %subscription.id,
            state = ?final_state,
            iterations,
            registered_at = %subscription.registered_at,
            "订阅结束"
        );
    }

    /// 退订是幂等的，重复调用无副作用
    pub async fn unsubscribe(&self, id: Uuid) {
        if self.remove(id).await {
            debug!(stream = self.name, subscription = %id, "订阅已退订");
        }
    }

    async fn remove(&self, id: Uuid) -> bool {
        self.registry.write().await.remove(&id).is_some()
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.registry.read().await.contains_key(&id)
    }

    pub async fn subscriber_count(&self) -> usize {
        self.registry.read().await.len()
    }

    /// 事件驱动的立即广播。对注册表快照逐个推送，单个订阅者的失败
    /// 只记录日志，清理交给该订阅者自己的推送循环。
    pub async fn broadcast_now(&self, event: &StreamEvent) {
        let subscriptions: Vec<Arc<StreamSubscription>> =
            self.registry.read().await.values().cloned().collect();
        debug!(
            stream = self.name,
            subscribers = subscriptions.len(),
            event = %event.event,
            "立即广播"
        );
        for subscription in subscriptions {
            if let Err(err) = subscription.sink.push(event) {
                warn!(
                    stream = self.name,
                    subscription = %subscription.id,
                    error = %err,
                    "广播推送失败"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedSource;

    #[async_trait]
    impl SnapshotSource for FixedSource {
        async fn snapshot(&self) -> StreamEvent {
            StreamEvent::new("stats", serde_json::json!({ "total": 1 }))
        }
    }

    /// 记录收到的所有事件
    struct CollectingSink {
        events: Mutex<Vec<StreamEvent>>,
    }

    impl CollectingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
            })
        }

        fn collected(&self) -> Vec<StreamEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl SubscriberSink for CollectingSink {
        fn push(&self, event: &StreamEvent) -> Result<(), SinkError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    /// 连接确认成功，之后全部失败
    struct FailingSink {
        pushes: AtomicUsize,
    }

    impl SubscriberSink for FailingSink {
        fn push(&self, event: &StreamEvent) -> Result<(), SinkError> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            if event.event == "connected" {
                Ok(())
            } else {
                Err(SinkError::Closed)
            }
        }
    }

    fn fast_config() -> StreamConfig {
        StreamConfig {
            push_interval: Duration::from_millis(10),
            max_iterations: 120,
            max_failures: 3,
        }
    }

    async fn wait_until<F>(mut predicate: F)
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
    async fn subscriber_receives_ack_then_periodic_pushes() {
        let broadcaster =
            StreamBroadcaster::new("stats-stream", Arc::new(FixedSource), fast_config());
        let sink = CollectingSink::new();
        let id = broadcaster.subscribe(sink.clone()).await;

        wait_until(|| sink.collected().len() >= 3).await;
        let events = sink.collected();
        assert_eq!(events[0].event, "connected");
        assert_eq!(events[1].event, "stats");

        broadcaster.unsubscribe(id).await;
        assert!(!broadcaster.contains(id).await);
    }

    #[tokio::test]
    async fn three_consecutive_failures_tear_down_only_that_subscription() {
        let broadcaster =
            StreamBroadcaster::new("stats-stream", Arc::new(FixedSource), fast_config());

        let healthy = CollectingSink::new();
        let failing = Arc::new(FailingSink {
            pushes: AtomicUsize::new(0),
        });

        let healthy_id = broadcaster.subscribe(healthy.clone()).await;
        let failing_id = broadcaster.subscribe(failing.clone()).await;
        assert_eq!(broadcaster.subscriber_count().await, 2);

        // 故障订阅在三次连续失败后被移除
        let broadcaster_ref = Arc::clone(&broadcaster);
        tokio::time::timeout(Duration::from_secs(2), async {
            while broadcaster_ref.contains(failing_id).await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("failing subscription should be removed");

        // 确认 + 3 次失败推送，之后不再被推送
        assert_eq!(failing.pushes.load(Ordering::SeqCst), 4);

        // 健康订阅不受影响，继续收到推送
        assert!(broadcaster.contains(healthy_id).await);
        let before = healthy.collected().len();
        wait_until(|| healthy.collected().len() > before).await;

        broadcaster.unsubscribe(healthy_id).await;
    }

    #[tokio::test]
    async fn iteration_budget_expires_subscription() {
        let broadcaster = StreamBroadcaster::new(
            "stats-stream",
            Arc::new(FixedSource),
            StreamConfig {
                push_interval: Duration::from_millis(5),
                max_iterations: 3,
                max_failures: 3,
            },
        );
        let sink = CollectingSink::new();
        let id = broadcaster.subscribe(sink.clone()).await;

        let broadcaster_ref = Arc::clone(&broadcaster);
        tokio::time::timeout(Duration::from_secs(2), async {
            while broadcaster_ref.contains(id).await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscription should expire");

        // 确认 + 最多 max_iterations 次周期推送
        assert!(sink.collected().len() <= 4);
    }

    #[tokio::test]
    async fn broadcast_now_reaches_all_then_respects_unsubscribe() {
        let broadcaster =
            StreamBroadcaster::new("product-stream", Arc::new(FixedSource), StreamConfig {
                push_interval: Duration::from_secs(60),
                max_iterations: 120,
                max_failures: 3,
            });

        let sink_a = CollectingSink::new();
        let sink_b = CollectingSink::new();
        let id_a = broadcaster.subscribe(sink_a.clone()).await;
        let _id_b = broadcaster.subscribe(sink_b.clone()).await;

        let event = StreamEvent::new("products", serde_json::json!([{ "id": 42 }]));
        broadcaster.broadcast_now(&event).await;

        let a_events = sink_a.collected();
        let b_events = sink_b.collected();
        assert_eq!(a_events.last().unwrap(), &event);
        assert_eq!(b_events.last().unwrap(), &event);

        broadcaster.unsubscribe(id_a).await;
        broadcaster.broadcast_now(&event).await;

        // A 退订后不再收到，B 继续收到
        assert_eq!(sink_a.collected().len(), a_events.len());
        assert_eq!(sink_b.collected().len(), b_events.len() + 1);
    }
}
