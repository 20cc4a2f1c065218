//! 二手交易市场领域层
//!
//! 包含商品与购买实体、事件信封、品类归一化规则以及仓储端口。

pub mod category;
pub mod entities;
pub mod errors;
pub mod events;
pub mod repositories;

pub use category::{normalize_category, supported_categories, FALLBACK_CATEGORY};
pub use entities::{NewProduct, Product, ProductStatus, ProductUpdate, Purchase};
pub use errors::{DomainError, DomainResult, RepositoryError, RepositoryResult};
pub use events::{
    AnalyticsContext, AnalyticsEvent, AnalyticsEventKind, NotificationChannel, NotificationEvent,
    NotificationPriority, ProductEvent, ProductEventKind,
};
pub use repositories::{ProductRepository, PurchaseRepository};
