pub mod product;
pub mod purchase;

pub use product::{NewProduct, Product, ProductStatus, ProductUpdate};
pub use purchase::Purchase;
