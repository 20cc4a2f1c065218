use std::sync::Arc;

use application::{AnalyticsService, ProductService, StreamBroadcaster};

#[derive(Clone)]
pub struct AppState {
    pub products: Arc<ProductService>,
    pub analytics: Arc<AnalyticsService>,
    pub product_stream: Arc<StreamBroadcaster>,
    pub analytics_stream: Arc<StreamBroadcaster>,
}
