pub mod product_repository_impl;
pub mod purchase_repository_impl;

pub use product_repository_impl::PgProductRepository;
pub use purchase_repository_impl::PgPurchaseRepository;
