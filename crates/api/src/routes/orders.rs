//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::time::to_unix;
use common::{OrderId, UserId};
use domain::order::{NewOrderItem, Order, OrderItem, OrderStatus};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: i32,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: i16,
}

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: OrderId,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_price: i64,
    pub status: i16,
    pub status_name: &'static str,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            items: order.items,
            total_price: order.total_price,
            status: order.status.code(),
            status_name: order.status.as_str(),
            created_at: to_unix(order.created_at),
            updated_at: to_unix(order.updated_at),
        }
    }
}

/// POST /orders: prices the items from the local product replicas.
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id, items = req.items.len()))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let user_id = parse_id(&req.user_id)?;
    let items = req
        .items
        .iter()
        .map(|item| {
            Ok(NewOrderItem {
                product_id: parse_id(&item.product_id)?,
                quantity: item.quantity,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let order_id = state.orders.create_order(user_id, items).await?;
    Ok((StatusCode::CREATED, Json(OrderCreatedResponse { order_id })))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.find_order(parse_id(&id)?).await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{id}/status
#[tracing::instrument(skip(state, req), fields(status = req.status))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<StatusCode, ApiError> {
    let status = OrderStatus::from_code(req.status)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid order status: {}", req.status)))?;
    state
        .orders
        .update_order_status(parse_id(&id)?, status)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
