//! 商品接口

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use application::services::{CreateProductRequest, PurchaseReceipt, PurchasedProduct, UpdateProductRequest};
use domain::Product;

use crate::analytics_routes::client_context;
use crate::auth::bearer_token;
use crate::error::ApiError;
use crate::state::AppState;
use crate::stream_routes;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    query: String,
    category: Option<String>,
    user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    user_id: Option<i64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/search", get(search_products))
        .route("/images", post(upload_image))
        .route("/my", get(my_products))
        .route("/purchased", get(purchased_products))
        .route("/stream", get(stream_routes::product_stream))
        .route(
            "/{id}",
            get(product_detail).put(update_product).delete(delete_product),
        )
        .route("/{id}/edit", get(product_for_edit))
        .route("/{id}/purchase", post(purchase_product))
}

async fn create_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let token = bearer_token(&headers)?;
    let product = state.products.create_product(token, payload).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state.products.list_products(query.category.as_deref()).await?;
    Ok(Json(products))
}

async fn search_products(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let context = client_context(&headers);
    let products = state
        .products
        .search_products(
            &query.query,
            query.category.as_deref(),
            query.user_id,
            context,
        )
        .await?;
    Ok(Json(products))
}

async fn product_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<DetailQuery>,
) -> Result<Json<Product>, ApiError> {
    let context = client_context(&headers);
    let product = state
        .products
        .product_detail(id, query.user_id, context)
        .await?;
    Ok(Json(product))
}

async fn product_for_edit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Product>, ApiError> {
    let token = bearer_token(&headers)?;
    let product = state.products.product_for_edit(id, token).await?;
    Ok(Json(product))
}

async fn update_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    let token = bearer_token(&headers)?;
    let product = state.products.update_product(id, token, payload).await?;
    Ok(Json(product))
}

async fn delete_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers)?;
    state.products.delete_product(id, token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn purchase_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<PurchaseReceipt>, ApiError> {
    let token = bearer_token(&headers)?;
    let receipt = state.products.purchase_product(id, token).await?;
    Ok(Json(receipt))
}

async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers)?.to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(err.to_string()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let original_name = field.file_name().unwrap_or("image.bin").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(err.to_string()))?;
        let url = state
            .products
            .upload_image(&token, bytes.to_vec(), &original_name)
            .await?;
        return Ok(Json(json!({ "image_url": url })));
    }
    Err(ApiError::bad_request("image 필드가 없습니다"))
}

async fn my_products(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Product>>, ApiError> {
    let token = bearer_token(&headers)?;
    let products = state.products.my_products(token).await?;
    Ok(Json(products))
}

async fn purchased_products(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PurchasedProduct>>, ApiError> {
    let token = bearer_token(&headers)?;
    let purchased = state.products.purchased_products(token).await?;
    Ok(Json(purchased))
}
