//! HTTP 接口层

pub mod analytics_routes;
pub mod auth;
pub mod error;
pub mod product_routes;
pub mod routes;
pub mod state;
pub mod stream_routes;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
