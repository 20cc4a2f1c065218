//! 通知事件

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Push,
}

impl NotificationChannel {
    pub fn routing_key(&self) -> &'static str {
        match self {
            Self::Email => "notification.email",
            Self::Push => "notification.push",
        }
    }

    pub fn all() -> [Self; 2] {
        [Self::Email, Self::Push]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub notification_id: Uuid,
    pub channel: NotificationChannel,
    /// 收件人标识，广播类通知为 None
    pub recipient: Option<String>,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub product_id: i64,
    pub product_title: String,
    pub product_price: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(
        channel: NotificationChannel,
        recipient: Option<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        priority: NotificationPriority,
        product_id: i64,
        product_title: impl Into<String>,
        product_price: Option<i64>,
    ) -> Self {
        Self {
            notification_id: Uuid::nil(),
            channel,
            recipient,
            title: title.into(),
            message: message.into(),
            priority,
            product_id,
            product_title: product_title.into(),
            product_price,
            created_at: Utc::now(),
        }
    }

    pub fn stamp(&mut self) {
        self.notification_id = Uuid::new_v4();
        self.created_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_routing_keys() {
        assert_eq!(
            NotificationChannel::Email.routing_key(),
            "notification.email"
        );
        assert_eq!(NotificationChannel::Push.routing_key(), "notification.push");
    }

    #[test]
    fn serde_round_trip() {
        let mut event = NotificationEvent::new(
            NotificationChannel::Push,
            Some("7".to_string()),
            "상품이 판매되었습니다!",
            "Desk 상품을 구매자님이 구매했습니다",
            NotificationPriority::High,
            42,
            "Desk",
            Some(50_000),
        );
        event.stamp();

        let json = serde_json::to_string(&event).unwrap();
        let decoded: NotificationEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, event);
    }
}
