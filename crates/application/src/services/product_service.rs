//! 商品用例服务
//!
//! 所有写操作先完成数据库变更，再异步发布事件；事件发布失败不回滚
//! 业务结果。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use domain::{
    normalize_category, AnalyticsContext, AnalyticsEvent, DomainError, NewProduct, Product,
    ProductEventKind, ProductRepository, ProductUpdate, Purchase, PurchaseRepository,
};

use crate::broadcaster::{SnapshotSource, StreamEvent};
use crate::error::ApplicationError;
use crate::identity::IdentityResolver;
use crate::ports::FileStorage;
use crate::publisher::EventPublisher;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub title: String,
    pub description: String,
    pub price: i64,
    pub category: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PurchaseReceipt {
    pub product_id: i64,
    pub purchase_price: i64,
    pub message: String,
}

/// 购买历史条目。商品可能已被删除，此时只保留购买记录里的信息。
#[derive(Debug, Clone, serde::Serialize)]
pub struct PurchasedProduct {
    pub product_id: i64,
    pub title: String,
    pub price: i64,
    pub seller_nickname: String,
    pub purchased_at: chrono::DateTime<chrono::Utc>,
}

pub struct ProductServiceDependencies {
    pub products: Arc<dyn ProductRepository>,
    pub purchases: Arc<dyn PurchaseRepository>,
    pub identity: Arc<IdentityResolver>,
    pub publisher: Arc<EventPublisher>,
    pub storage: Arc<dyn FileStorage>,
}

pub struct ProductService {
    products: Arc<dyn ProductRepository>,
    purchases: Arc<dyn PurchaseRepository>,
    identity: Arc<IdentityResolver>,
    publisher: Arc<EventPublisher>,
    storage: Arc<dyn FileStorage>,
}

impl ProductService {
    pub fn new(deps: ProductServiceDependencies) -> Arc<Self> {
        Arc::new(Self {
            products: deps.products,
            purchases: deps.purchases,
            identity: deps.identity,
            publisher: deps.publisher,
            storage: deps.storage,
        })
    }

    /// 上传商品图片，返回可公开访问的 URL
    pub async fn upload_image(
        &self,
        token: &str,
        bytes: Vec<u8>,
        original_name: &str,
    ) -> Result<String, ApplicationError> {
        self.identity.resolve(token).await?;
        if bytes.is_empty() {
            return Err(DomainError::validation("image", "이미지가 비어 있습니다").into());
        }
        self.storage
            .store(bytes, original_name)
            .await
            .map_err(|err| ApplicationError::infrastructure(err.to_string()))
    }

    pub async fn create_product(
        &self,
        token: &str,
        request: CreateProductRequest,
    ) -> Result<Product, ApplicationError> {
        let identity = self.identity.resolve(token).await?;
        let product = Product::new(
            identity.user_id,
            identity.nickname,
            NewProduct {
                title: request.title,
                description: request.description,
                price: request.price,
                category: request.category,
                image_url: request.image_url,
            },
        )?;
        let saved = self.products.create(product).await?;
        info!(product_id = saved.id, seller_id = saved.seller_id, "商品已创建");

        self.publisher
            .publish_product(ProductEventKind::Created, &saved)
            .await;
        Ok(saved)
    }

    pub async fn list_products(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<Product>, ApplicationError> {
        Ok(self.products.list_recent(category).await?)
    }

    /// 搜索商品并发布搜索统计事件
    pub async fn search_products(
        &self,
        query: &str,
        category: Option<&str>,
        user_id: Option<i64>,
        context: AnalyticsContext,
    ) -> Result<Vec<Product>, ApplicationError> {
        let results = self.products.search_by_title(query, category).await?;

        let normalized = normalize_category(category);
        self.publisher
            .publish_analytics(AnalyticsEvent::search(
                query.to_string(),
                normalized.to_string(),
                results.len() as i64,
                user_id,
                context,
            ))
            .await;
        Ok(results)
    }

    /// 商品详情，同时发布浏览统计事件
    pub async fn product_detail(
        &self,
        product_id: i64,
        user_id: Option<i64>,
        context: AnalyticsContext,
    ) -> Result<Product, ApplicationError> {
        let product = self
            .products
            .find_by_id(product_id)
            .await?
            .ok_or(DomainError::ProductNotFound { product_id })?;

        let normalized = normalize_category(Some(&product.category));
        self.publisher
            .publish_analytics(AnalyticsEvent::view(
                product_id,
                normalized.to_string(),
                user_id,
                context,
            ))
            .await;
        Ok(product)
    }

    /// 编辑页数据：仅商品所有者可访问
    pub async fn product_for_edit(
        &self,
        product_id: i64,
        token: &str,
    ) -> Result<Product, ApplicationError> {
        let identity = self.identity.resolve(token).await?;
        let product = self
            .products
            .find_by_id(product_id)
            .await?
            .ok_or(DomainError::ProductNotFound { product_id })?;
        if !product.is_owned_by(identity.user_id) {
            return Err(DomainError::permission_denied("edit_product").into());
        }
        Ok(product)
    }

    pub async fn update_product(
        &self,
        product_id: i64,
        token: &str,
        request: UpdateProductRequest,
    ) -> Result<Product, ApplicationError> {
        let identity = self.identity.resolve(token).await?;
        let mut product = self
            .products
            .find_by_id(product_id)
            .await?
            .ok_or(DomainError::ProductNotFound { product_id })?;
        if !product.is_owned_by(identity.user_id) {
            return Err(DomainError::permission_denied("update_product").into());
        }
        product.apply_update(ProductUpdate {
            title: request.title,
            description: request.description,
            price: request.price,
            category: request.category,
            image_url: request.image_url,
        })?;
        let saved = self.products.update(product).await?;

        self.publisher
            .publish_product(ProductEventKind::Updated, &saved)
            .await;
        Ok(saved)
    }

    pub async fn delete_product(
        &self,
        product_id: i64,
        token: &str,
    ) -> Result<(), ApplicationError> {
        let identity = self.identity.resolve(token).await?;
        let product = self
            .products
            .find_by_id(product_id)
            .await?
            .ok_or(DomainError::ProductNotFound { product_id })?;
        if !product.is_owned_by(identity.user_id) {
            return Err(DomainError::permission_denied("delete_product").into());
        }
        if product.is_sold() {
            return Err(DomainError::already_sold(product_id).into());
        }

        // 先发事件（携带完整快照），后删除记录
        self.publisher
            .publish_product(ProductEventKind::Deleted, &product)
            .await;
        self.products.delete(product_id).await?;
        info!(product_id, "商品已删除");
        Ok(())
    }

    pub async fn purchase_product(
        &self,
        product_id: i64,
        token: &str,
    ) -> Result<PurchaseReceipt, ApplicationError> {
        let identity = self.identity.resolve(token).await?;
        let mut product = self
            .products
            .find_by_id(product_id)
            .await?
            .ok_or(DomainError::ProductNotFound { product_id })?;

        if product.is_owned_by(identity.user_id) {
            return Err(DomainError::CannotPurchaseOwnProduct.into());
        }
        if product.is_sold() {
            return Err(DomainError::already_sold(product_id).into());
        }

        let purchase = Purchase::new(
            product_id,
            identity.user_id,
            product.seller_id,
            product.price,
        );
        let purchase = self.purchases.create(purchase).await?;

        product.mark_as_sold();
        let product = self.products.update(product).await?;
        info!(
            product_id,
            buyer_id = identity.user_id,
            purchase_id = purchase.id,
            "商品已售出"
        );

        self.publisher
            .publish_purchase(&product, identity.user_id, identity.nickname)
            .await;

        Ok(PurchaseReceipt {
            product_id,
            purchase_price: purchase.purchase_price,
            message: "구매가 완료되었습니다".to_string(),
        })
    }

    pub async fn my_products(&self, token: &str) -> Result<Vec<Product>, ApplicationError> {
        let identity = self.identity.resolve(token).await?;
        Ok(self.products.list_by_seller(identity.user_id).await?)
    }

    /// 购买历史：批量回查商品，已删除的商品退化为购买记录信息
    pub async fn purchased_products(
        &self,
        token: &str,
    ) -> Result<Vec<PurchasedProduct>, ApplicationError> {
        let identity = self.identity.resolve(token).await?;
        let purchases = self.purchases.list_by_buyer(identity.user_id).await?;

        let ids: Vec<i64> = purchases.iter().map(|p| p.product_id).collect();
        let products = self.products.find_by_ids(&ids).await?;

        Ok(purchases
            .into_iter()
            .map(|purchase| {
                match products.iter().find(|p| p.id == purchase.product_id) {
                    Some(product) => PurchasedProduct {
                        product_id: product.id,
                        title: product.title.clone(),
                        price: purchase.purchase_price,
                        seller_nickname: product.seller_nickname.clone(),
                        purchased_at: purchase.purchased_at,
                    },
                    None => PurchasedProduct {
                        product_id: purchase.product_id,
                        title: "삭제된 상품".to_string(),
                        price: purchase.purchase_price,
                        seller_nickname: String::new(),
                        purchased_at: purchase.purchased_at,
                    },
                }
            })
            .collect())
    }
}

/// 商品实时流的周期快照：当前商品列表
#[async_trait]
impl SnapshotSource for ProductService {
    async fn snapshot(&self) -> StreamEvent {
        match self.products.list_recent(None).await {
            Ok(products) => StreamEvent::new("products", json!(products)),
            Err(err) => {
                warn!(error = %err, "商品快照查询失败，推送空列表");
                StreamEvent::new("products", json!([]))
            }
        }
    }
}
