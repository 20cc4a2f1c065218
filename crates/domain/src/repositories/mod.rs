//! 仓储端口定义，具体实现位于基础设施层

use async_trait::async_trait;

use crate::entities::{Product, Purchase};
use crate::errors::RepositoryResult;

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// 插入商品并返回带数据库分配 id 的实体
    async fn create(&self, product: Product) -> RepositoryResult<Product>;

    async fn update(&self, product: Product) -> RepositoryResult<Product>;

    async fn delete(&self, id: i64) -> RepositoryResult<()>;

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Product>>;

    /// 按创建时间倒序列出商品，可选按品类过滤
    async fn list_recent(&self, category: Option<&str>) -> RepositoryResult<Vec<Product>>;

    async fn search_by_title(
        &self,
        query: &str,
        category: Option<&str>,
    ) -> RepositoryResult<Vec<Product>>;

    async fn list_by_seller(&self, seller_id: i64) -> RepositoryResult<Vec<Product>>;

    /// 批量查询，避免逐件回查
    async fn find_by_ids(&self, ids: &[i64]) -> RepositoryResult<Vec<Product>>;

    async fn count(&self) -> RepositoryResult<i64>;

    async fn count_by_category(&self) -> RepositoryResult<Vec<(String, i64)>>;
}

#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    async fn create(&self, purchase: Purchase) -> RepositoryResult<Purchase>;

    async fn list_by_buyer(&self, buyer_id: i64) -> RepositoryResult<Vec<Purchase>>;
}
