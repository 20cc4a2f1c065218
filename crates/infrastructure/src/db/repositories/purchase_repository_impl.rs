//! 购买记录仓储的 Postgres 实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use domain::{Purchase, PurchaseRepository, RepositoryError, RepositoryResult};

#[derive(Debug, sqlx::FromRow)]
struct PurchaseRecord {
    id: i64,
    product_id: i64,
    buyer_id: i64,
    seller_id: i64,
    purchase_price: i64,
    purchased_at: DateTime<Utc>,
}

impl From<PurchaseRecord> for Purchase {
    fn from(record: PurchaseRecord) -> Self {
        Purchase {
            id: record.id,
            product_id: record.product_id,
            buyer_id: record.buyer_id,
            seller_id: record.seller_id,
            purchase_price: record.purchase_price,
            purchased_at: record.purchased_at,
        }
    }
}

fn map_err(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        other => RepositoryError::storage(other.to_string()),
    }
}

pub struct PgPurchaseRepository {
    pool: PgPool,
}

impl PgPurchaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PurchaseRepository for PgPurchaseRepository {
    async fn create(&self, purchase: Purchase) -> RepositoryResult<Purchase> {
        let record = sqlx::query_as::<_, PurchaseRecord>(
            r#"
            INSERT INTO purchases
                (product_id, buyer_id, seller_id, purchase_price, purchased_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(purchase.product_id)
        .bind(purchase.buyer_id)
        .bind(purchase.seller_id)
        .bind(purchase.purchase_price)
        .bind(purchase.purchased_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(record.into())
    }

    async fn list_by_buyer(&self, buyer_id: i64) -> RepositoryResult<Vec<Purchase>> {
        let records = sqlx::query_as::<_, PurchaseRecord>(
            "SELECT * FROM purchases WHERE buyer_id = $1 ORDER BY purchased_at DESC",
        )
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(records.into_iter().map(Purchase::from).collect())
    }
}
