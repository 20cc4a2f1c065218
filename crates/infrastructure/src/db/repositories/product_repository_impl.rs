//! 商品仓储的 Postgres 实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use domain::{Product, ProductRepository, ProductStatus, RepositoryError, RepositoryResult};

#[derive(Debug, sqlx::FromRow)]
struct ProductRecord {
    id: i64,
    title: String,
    description: String,
    price: i64,
    category: String,
    image_url: Option<String>,
    seller_id: i64,
    seller_nickname: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRecord> for Product {
    type Error = RepositoryError;

    fn try_from(record: ProductRecord) -> Result<Self, Self::Error> {
        let status = ProductStatus::parse(&record.status).ok_or_else(|| {
            RepositoryError::storage(format!("未知的商品状态: {}", record.status))
        })?;
        Ok(Product {
            id: record.id,
            title: record.title,
            description: record.description,
            price: record.price,
            category: record.category,
            image_url: record.image_url,
            seller_id: record.seller_id,
            seller_nickname: record.seller_nickname,
            status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

fn map_err(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        other => RepositoryError::storage(other.to_string()),
    }
}

pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn create(&self, product: Product) -> RepositoryResult<Product> {
        let record = sqlx::query_as::<_, ProductRecord>(
            r#"
            INSERT INTO products
                (title, description, price, category, image_url,
                 seller_id, seller_nickname, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.category)
        .bind(&product.image_url)
        .bind(product.seller_id)
        .bind(&product.seller_nickname)
        .bind(product.status.as_str())
        .bind(product.created_at)
        .bind(product.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;

        record.try_into()
    }

    async fn update(&self, product: Product) -> RepositoryResult<Product> {
        let record = sqlx::query_as::<_, ProductRecord>(
            r#"
            UPDATE products
            SET title = $2, description = $3, price = $4, category = $5,
                image_url = $6, status = $7, updated_at = $8
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(product.id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.category)
        .bind(&product.image_url)
        .bind(product.status.as_str())
        .bind(product.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;

        record.try_into()
    }

    async fn delete(&self, id: i64) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Product>> {
        let record = sqlx::query_as::<_, ProductRecord>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        record.map(Product::try_from).transpose()
    }

    async fn list_recent(&self, category: Option<&str>) -> RepositoryResult<Vec<Product>> {
        let records = match category {
            Some(category) => {
                sqlx::query_as::<_, ProductRecord>(
                    "SELECT * FROM products WHERE category = $1 ORDER BY created_at DESC",
                )
                .bind(category)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, ProductRecord>(
                    "SELECT * FROM products ORDER BY created_at DESC",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_err)?;

        records.into_iter().map(Product::try_from).collect()
    }

    async fn search_by_title(
        &self,
        query: &str,
        category: Option<&str>,
    ) -> RepositoryResult<Vec<Product>> {
        let pattern = format!("%{}%", query.trim());
        let records = match category {
            Some(category) => {
                sqlx::query_as::<_, ProductRecord>(
                    r#"
                    SELECT * FROM products
                    WHERE title ILIKE $1 AND category = $2
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(&pattern)
                .bind(category)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, ProductRecord>(
                    "SELECT * FROM products WHERE title ILIKE $1 ORDER BY created_at DESC",
                )
                .bind(&pattern)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_err)?;

        records.into_iter().map(Product::try_from).collect()
    }

    async fn list_by_seller(&self, seller_id: i64) -> RepositoryResult<Vec<Product>> {
        let records = sqlx::query_as::<_, ProductRecord>(
            "SELECT * FROM products WHERE seller_id = $1 ORDER BY created_at DESC",
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        records.into_iter().map(Product::try_from).collect()
    }

    async fn find_by_ids(&self, ids: &[i64]) -> RepositoryResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = sqlx::query_as::<_, ProductRecord>(
            "SELECT * FROM products WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        records.into_iter().map(Product::try_from).collect()
    }

    async fn count(&self) -> RepositoryResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(count.0)
    }

    async fn count_by_category(&self) -> RepositoryResult<Vec<(String, i64)>> {
        sqlx::query_as::<_, (String, i64)>(
            "SELECT category, COUNT(*) FROM products GROUP BY category ORDER BY COUNT(*) DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)
    }
}
