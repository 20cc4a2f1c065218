//! 浏览与搜索统计事件

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsEventKind {
    View,
    Search,
}

impl AnalyticsEventKind {
    pub fn routing_key(&self) -> &'static str {
        match self {
            Self::View => "analytics.view",
            Self::Search => "analytics.search",
        }
    }

    pub fn all() -> [Self; 2] {
        [Self::View, Self::Search]
    }
}

/// 请求上下文，来源于追踪接口的请求头
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsContext {
    pub session_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// 统计事件。`category` 必须是归一化之后的品类。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event_id: Uuid,
    pub kind: AnalyticsEventKind,
    pub occurred_at: DateTime<Utc>,
    pub product_id: Option<i64>,
    pub keyword: Option<String>,
    pub category: String,
    pub result_count: Option<i64>,
    pub user_id: Option<i64>,
    pub context: AnalyticsContext,
}

impl AnalyticsEvent {
    pub fn view(
        product_id: i64,
        category: String,
        user_id: Option<i64>,
        context: AnalyticsContext,
    ) -> Self {
        Self {
            event_id: Uuid::nil(),
            kind: AnalyticsEventKind::View,
            occurred_at: Utc::now(),
            product_id: Some(product_id),
            keyword: None,
            category,
            result_count: None,
            user_id,
            context,
        }
    }

    pub fn search(
        keyword: String,
        category: String,
        result_count: i64,
        user_id: Option<i64>,
        context: AnalyticsContext,
    ) -> Self {
        Self {
            event_id: Uuid::nil(),
            kind: AnalyticsEventKind::Search,
            occurred_at: Utc::now(),
            product_id: None,
            keyword: Some(keyword),
            category,
            result_count: Some(result_count),
            user_id,
            context,
        }
    }

    pub fn stamp(&mut self) {
        self.event_id = Uuid::new_v4();
        self.occurred_at = Utc::now();
    }

    /// 日志用的主体标识
    pub fn subject(&self) -> String {
        match self.kind {
            AnalyticsEventKind::View => self
                .product_id
                .map(|id| format!("product:{id}"))
                .unwrap_or_else(|| "product:?".to_string()),
            AnalyticsEventKind::Search => self
                .keyword
                .clone()
                .map(|kw| format!("keyword:{kw}"))
                .unwrap_or_else(|| "keyword:?".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_keys_are_stable() {
        assert_eq!(AnalyticsEventKind::View.routing_key(), "analytics.view");
        assert_eq!(AnalyticsEventKind::Search.routing_key(), "analytics.search");
    }

    #[test]
    fn view_event_carries_product_subject() {
        let event = AnalyticsEvent::view(42, "전자제품".to_string(), None, Default::default());
        assert_eq!(event.subject(), "product:42");
        assert_eq!(event.keyword, None);
    }

    #[test]
    fn search_event_serde_round_trip() {
        let mut event = AnalyticsEvent::search(
            "노트북".to_string(),
            "전자제품".to_string(),
            12,
            Some(3),
            AnalyticsContext {
                session_id: Some("s-1".to_string()),
                ip: Some("10.0.0.1".to_string()),
                user_agent: None,
                referrer: None,
            },
        );
        event.stamp();

        let json = serde_json::to_vec(&event).unwrap();
        let decoded: AnalyticsEvent = serde_json::from_slice(&json).unwrap();
        assert_eq!(decoded, event);
    }
}
