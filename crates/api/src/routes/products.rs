//! Product catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ProductId;
use common::time::to_unix;
use domain::product::{Product, ProductData};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
}

impl From<ProductRequest> for ProductData {
    fn from(req: ProductRequest) -> Self {
        ProductData {
            name: req.name,
            description: req.description,
            price: req.price,
        }
    }
}

#[derive(Serialize)]
pub struct ProductCreatedResponse {
    pub product_id: ProductId,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            created_at: to_unix(product.created_at),
            updated_at: to_unix(product.updated_at),
        }
    }
}

/// POST /products
#[tracing::instrument(skip(state, req), fields(name = %req.name))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<ProductCreatedResponse>), ApiError> {
    let product_id = state.products.create_product(req.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(ProductCreatedResponse { product_id }),
    ))
}

/// PUT /products/{id}: replaces name, description and price.
#[tracing::instrument(skip(state, req))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ProductRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .products
        .update_product(parse_id(&id)?, req.into())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /products/{id}
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.products.delete_product(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.products.find_product(parse_id(&id)?).await?;
    Ok(Json(product.into()))
}
