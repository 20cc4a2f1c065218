//! 商品实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};

const MAX_TITLE_LENGTH: usize = 100;
const MAX_DESCRIPTION_LENGTH: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    Available,
    Sold,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Sold => "SOLD",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "AVAILABLE" => Some(Self::Available),
            "SOLD" => Some(Self::Sold),
            _ => None,
        }
    }
}

/// 创建商品的已校验输入
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub price: i64,
    pub category: String,
    pub image_url: Option<String>,
}

/// 更新商品的输入，None 表示保持原值
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub category: String,
    pub image_url: Option<String>,
    pub seller_id: i64,
    pub seller_nickname: String,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// 构造新商品，id 在入库时由数据库分配
    pub fn new(seller_id: i64, seller_nickname: String, input: NewProduct) -> DomainResult<Self> {
        validate_title(&input.title)?;
        validate_description(&input.description)?;
        validate_price(input.price)?;

        let now = Utc::now();
        Ok(Self {
            id: 0,
            title: input.title.trim().to_string(),
            description: input.description,
            price: input.price,
            category: input.category,
            image_url: input.image_url,
            seller_id,
            seller_nickname,
            status: ProductStatus::Available,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.seller_id == user_id
    }

    pub fn is_sold(&self) -> bool {
        self.status == ProductStatus::Sold
    }

    pub fn mark_as_sold(&mut self) {
        self.status = ProductStatus::Sold;
        self.updated_at = Utc::now();
    }

    /// 修改商品信息。已售出的商品不可修改。
    pub fn apply_update(&mut self, update: ProductUpdate) -> DomainResult<()> {
        if self.is_sold() {
            return Err(DomainError::already_sold(self.id));
        }
        if let Some(title) = update.title {
            validate_title(&title)?;
            self.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            validate_description(&description)?;
            self.description = description;
        }
        if let Some(price) = update.price {
            validate_price(price)?;
            self.price = price;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(image_url) = update.image_url {
            self.image_url = Some(image_url);
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn validate_title(title: &str) -> DomainResult<()> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("title", "标题不能为空"));
    }
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(DomainError::validation("title", "标题过长"));
    }
    Ok(())
}

fn validate_description(description: &str) -> DomainResult<()> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(DomainError::validation("description", "描述过长"));
    }
    Ok(())
}

fn validate_price(price: i64) -> DomainResult<()> {
    if price <= 0 {
        return Err(DomainError::validation("price", "价格必须大于 0"));
    }
    Ok(())
}
