pub mod analytics_service;
pub mod product_service;

pub use analytics_service::{
    AnalyticsService, AnalyticsServiceDependencies, CategoryStats, DashboardSnapshot,
    PopularProduct,
};
pub use product_service::{
    CreateProductRequest, ProductService, ProductServiceDependencies, PurchaseReceipt,
    PurchasedProduct, UpdateProductRequest,
};
