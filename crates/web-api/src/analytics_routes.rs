//! 统计接口

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use application::services::{CategoryStats, DashboardSnapshot, PopularProduct};
use domain::AnalyticsContext;

use crate::error::ApiError;
use crate::state::AppState;
use crate::stream_routes;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/view/{product_id}", post(track_view))
        .route("/search", post(track_search))
        .route("/product/{product_id}/views", get(product_views))
        .route("/search/{keyword}/count", get(keyword_count))
        .route("/category/{category}/stats", get(category_stats))
        .route("/popular-products", get(popular_products))
        .route("/dashboard", get(dashboard))
        .route("/stream", get(stream_routes::analytics_stream))
}

/// 从追踪请求头提取客户端上下文
pub(crate) fn client_context(headers: &HeaderMap) -> AnalyticsContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let ip = header("X-Forwarded-For")
        .map(|forwarded| {
            forwarded
                .split(',')
                .next()
                .unwrap_or(&forwarded)
                .trim()
                .to_string()
        })
        .or_else(|| header("X-Real-IP"));

    AnalyticsContext {
        session_id: header("X-Session-Id"),
        ip,
        user_agent: header("User-Agent"),
        referrer: header("Referer"),
    }
}

#[derive(Debug, Default, Deserialize)]
struct TrackViewPayload {
    category: Option<String>,
    user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TrackSearchPayload {
    keyword: String,
    category: Option<String>,
    result_count: Option<i64>,
    user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PopularQuery {
    limit: Option<usize>,
}

async fn track_view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<i64>,
    payload: Option<Json<TrackViewPayload>>,
) -> Result<Json<Value>, ApiError> {
    let payload = payload.map(|Json(body)| body).unwrap_or_default();
    let context = client_context(&headers);
    let category = state
        .analytics
        .track_view(
            product_id,
            payload.category.as_deref(),
            payload.user_id,
            context,
        )
        .await;
    Ok(Json(json!({
        "tracked": true,
        "product_id": product_id,
        "category": category,
    })))
}

async fn track_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TrackSearchPayload>,
) -> Result<Json<Value>, ApiError> {
    let keyword = payload.keyword.trim().to_string();
    if keyword.is_empty() {
        return Err(ApiError::bad_request("검색어가 비어 있습니다"));
    }
    let context = client_context(&headers);
    let category = state
        .analytics
        .track_search(
            keyword.clone(),
            payload.category.as_deref(),
            payload.result_count.unwrap_or(0),
            payload.user_id,
            context,
        )
        .await;
    Ok(Json(json!({
        "tracked": true,
        "keyword": keyword,
        "category": category,
    })))
}

async fn product_views(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Json<Value> {
    Json(json!({
        "product_id": product_id,
        "view_count": state.analytics.view_count(product_id),
    }))
}

async fn keyword_count(
    State(state): State<AppState>,
    Path(keyword): Path<String>,
) -> Json<Value> {
    Json(json!({
        "keyword": keyword,
        "search_count": state.analytics.search_count(&keyword),
    }))
}

async fn category_stats(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Json<CategoryStats> {
    Json(state.analytics.category_stats(Some(&category)))
}

async fn popular_products(
    State(state): State<AppState>,
    Query(query): Query<PopularQuery>,
) -> Result<Json<Vec<PopularProduct>>, ApiError> {
    let limit = query.limit.unwrap_or(10).min(50);
    let popular = state.analytics.popular_products(limit).await?;
    Ok(Json(popular))
}

async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<DashboardSnapshot>, ApiError> {
    let snapshot = state.analytics.dashboard().await?;
    Ok(Json(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_ip_takes_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Forwarded-For",
            HeaderValue::from_static("10.0.0.1, 172.16.0.1"),
        );
        headers.insert("User-Agent", HeaderValue::from_static("test-agent"));

        let context = client_context(&headers);
        assert_eq!(context.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(context.user_agent.as_deref(), Some("test-agent"));
    }

    #[test]
    fn real_ip_is_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Real-IP", HeaderValue::from_static("192.168.0.9"));
        let context = client_context(&headers);
        assert_eq!(context.ip.as_deref(), Some("192.168.0.9"));
    }
}
