//! 商品生命周期事件

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductEventKind {
    Created,
    Updated,
    Deleted,
    Purchased,
}

impl ProductEventKind {
    pub fn routing_key(&self) -> &'static str {
        match self {
            Self::Created => "product.created",
            Self::Updated => "product.updated",
            Self::Deleted => "product.deleted",
            Self::Purchased => "product.purchased",
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created => "product_created",
            Self::Updated => "product_updated",
            Self::Deleted => "product_deleted",
            Self::Purchased => "product_purchased",
        }
    }

    pub fn all() -> [Self; 4] {
        [Self::Created, Self::Updated, Self::Deleted, Self::Purchased]
    }
}

/// 商品事件携带发布时刻的完整商品快照，消费方不需要回查数据库。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductEvent {
    pub event_id: Uuid,
    pub kind: ProductEventKind,
    pub occurred_at: DateTime<Utc>,
    pub product_id: i64,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub category: String,
    pub image_url: Option<String>,
    pub seller_id: i64,
    pub seller_nickname: String,
    pub status: String,
    pub buyer_id: Option<i64>,
    pub buyer_nickname: Option<String>,
    pub purchase_price: Option<i64>,
}

impl ProductEvent {
    /// 事件 id 与时间戳先置空，由发布器在发布时刻调用 [`stamp`](Self::stamp) 填充。
    pub fn from_product(kind: ProductEventKind, product: &Product) -> Self {
        Self {
            event_id: Uuid::nil(),
            kind,
            occurred_at: product.updated_at,
            product_id: product.id,
            title: product.title.clone(),
            description: product.description.clone(),
            price: product.price,
            category: product.category.clone(),
            image_url: product.image_url.clone(),
            seller_id: product.seller_id,
            seller_nickname: product.seller_nickname.clone(),
            status: product.status.as_str().to_string(),
            buyer_id: None,
            buyer_nickname: None,
            purchase_price: None,
        }
    }

    pub fn with_purchase(mut self, buyer_id: i64, buyer_nickname: String, price: i64) -> Self {
        self.buyer_id = Some(buyer_id);
        self.buyer_nickname = Some(buyer_nickname);
        self.purchase_price = Some(price);
        self
    }

    pub fn stamp(&mut self) {
        self.event_id = Uuid::new_v4();
        self.occurred_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{NewProduct, Product};

    fn sample_product() -> Product {
        Product::new(
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
        .unwrap()
    }

    #[test]
    fn routing_keys_match_topic_layout() {
        assert_eq!(ProductEventKind::Created.routing_key(), "product.created");
        assert_eq!(ProductEventKind::Updated.routing_key(), "product.updated");
        assert_eq!(ProductEventKind::Deleted.routing_key(), "product.deleted");
        assert_eq!(
            ProductEventKind::Purchased.routing_key(),
            "product.purchased"
        );
    }

    #[test]
    fn stamp_assigns_event_identity() {
        let mut event = ProductEvent::from_product(ProductEventKind::Created, &sample_product());
        assert!(event.event_id.is_nil());
        event.stamp();
        assert!(!event.event_id.is_nil());
    }

    #[test]
    fn serde_round_trip_keeps_snapshot() {
        let mut event = ProductEvent::from_product(ProductEventKind::Purchased, &sample_product())
            .with_purchase(11, "구매자".to_string(), 50_000);
        event.stamp();

        let json = serde_json::to_string(&event).unwrap();
        let decoded: ProductEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.buyer_id, Some(11));
    }
}
