//! 购买记录实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: i64,
    pub product_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub purchase_price: i64,
    pub purchased_at: DateTime<Utc>,
}

impl Purchase {
    /// 成交价取下单时刻的商品价格，id 由数据库分配
    pub fn new(product_id: i64, buyer_id: i64, seller_id: i64, purchase_price: i64) -> Self {
        Self {
            id: 0,
            product_id,
            buyer_id,
            seller_id,
            purchase_price,
            purchased_at: Utc::now(),
        }
    }
}
