//! 统计用例服务
//!
//! 追踪接口只负责归一化品类并发布事件，计数的唯一写入方是统计队列
//! 的消费处理器。查询接口直接读取进程内计数器。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use domain::{normalize_category, AnalyticsContext, AnalyticsEvent, ProductRepository};

use crate::aggregate_store::{AggregateStore, CategoryNamespace, KeywordCount};
use crate::broadcaster::{SnapshotSource, StreamEvent};
use crate::error::ApplicationError;
use crate::publisher::EventPublisher;

#[derive(Debug, Clone, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub view_count: u64,
    pub search_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopularProduct {
    pub product_id: i64,
    pub title: String,
    pub price: i64,
    pub category: String,
    pub view_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub total_products: i64,
    pub total_views: u64,
    pub total_searches: u64,
    pub category_stats: Vec<CategoryProductCount>,
    pub top_keywords: Vec<KeywordCount>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryProductCount {
    pub category: String,
    pub count: i64,
}

pub struct AnalyticsServiceDependencies {
    pub store: Arc<AggregateStore>,
    pub products: Arc<dyn ProductRepository>,
    pub publisher: Arc<EventPublisher>,
}

pub struct AnalyticsService {
    store: Arc<AggregateStore>,
    products: Arc<dyn ProductRepository>,
    publisher: Arc<EventPublisher>,
}

impl AnalyticsService {
    pub fn new(deps: AnalyticsServiceDependencies) -> Arc<Self> {
        Arc::new(Self {
            store: deps.store,
            products: deps.products,
            publisher: deps.publisher,
        })
    }

    /// 记录一次商品浏览，返回归一化后的品类
    pub async fn track_view(
        &self,
        product_id: i64,
        category: Option<&str>,
        user_id: Option<i64>,
        context: AnalyticsContext,
    ) -> &'static str {
        let normalized = normalize_category(category);
        self.publisher
            .publish_analytics(AnalyticsEvent::view(
                product_id,
                normalized.to_string(),
                user_id,
                context,
            ))
            .await;
        normalized
    }

    pub async fn track_search(
        &self,
        keyword: String,
        category: Option<&str>,
        result_count: i64,
        user_id: Option<i64>,
        context: AnalyticsContext,
    ) -> &'static str {
        let normalized = normalize_category(category);
        self.publisher
            .publish_analytics(AnalyticsEvent::search(
                keyword,
                normalized.to_string(),
                result_count,
                user_id,
                context,
            ))
            .await;
        normalized
    }

    pub fn view_count(&self, product_id: i64) -> u64 {
        self.store.view_count(product_id)
    }

    pub fn search_count(&self, keyword: &str) -> u64 {
        self.store.search_count(keyword)
    }

    pub fn category_stats(&self, category: Option<&str>) -> CategoryStats {
        let normalized = normalize_category(category);
        CategoryStats {
            category: normalized.to_string(),
            view_count: self.store.category_count(CategoryNamespace::View, normalized),
            search_count: self
                .store
                .category_count(CategoryNamespace::Search, normalized),
        }
    }

    /// 按进程内浏览数排序的热门商品
    pub async fn popular_products(
        &self,
        limit: usize,
    ) -> Result<Vec<PopularProduct>, ApplicationError> {
        let products = self.products.list_recent(None).await?;
        let mut popular: Vec<PopularProduct> = products
            .into_iter()
            .map(|product| PopularProduct {
                view_count: self.store.view_count(product.id),
                product_id: product.id,
                title: product.title,
                price: product.price,
                category: product.category,
            })
            .collect();
        popular.sort_by(|a, b| b.view_count.cmp(&a.view_count));
        popular.truncate(limit);
        Ok(popular)
    }

    pub async fn dashboard(&self) -> Result<DashboardSnapshot, ApplicationError> {
        let total_products = self.products.count().await?;
        let category_stats = self
            .products
            .count_by_category()
            .await?
            .into_iter()
            .map(|(category, count)| CategoryProductCount { category, count })
            .collect();
        let totals = self.store.totals();

        Ok(DashboardSnapshot {
            total_products,
            total_views: totals.total_views,
            total_searches: totals.total_searches,
            category_stats,
            top_keywords: self.store.top_keywords(5),
            generated_at: Utc::now(),
        })
    }
}

/// 统计实时流的周期快照：仪表盘数据
#[async_trait]
impl SnapshotSource for AnalyticsService {
    async fn snapshot(&self) -> StreamEvent {
        match self.dashboard().await {
            Ok(snapshot) => StreamEvent::new("stats", json!(snapshot)),
            Err(err) => {
                // 数据库不可用时退化为纯进程内数据
                warn!(error = %err, "仪表盘快照查询失败，退化为计数器数据");
                let totals = self.store.totals();
                StreamEvent::new(
                    "stats",
                    json!({
                        "total_views": totals.total_views,
                        "total_searches": totals.total_searches,
                        "top_keywords": self.store.top_keywords(5),
                    }),
                )
            }
        }
    }
}
