//! Bus delivery intake: hands a message to a service's inbound consumer.
//!
//! The response tells the broker bridge what to do with the message: 200
//! acknowledges it, 503 asks for redelivery.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use consumer::{Delivery, Outcome};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

pub const EVENT_TYPE_HEADER: &str = "x-event-type";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const ROUTING_KEY_HEADER: &str = "x-routing-key";

#[derive(Serialize)]
pub struct DeliveryResponse {
    pub consumer: &'static str,
    pub outcome: &'static str,
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// POST /deliveries/{service}
#[tracing::instrument(skip(state, headers, body), fields(body_len = body.len()))]
pub async fn deliver(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DeliveryResponse>), ApiError> {
    let consumer = state
        .consumer(&service)
        .ok_or_else(|| ApiError::NotFound(format!("No consumer for service {service}")))?;

    let delivery = Delivery {
        event_type: header_value(&headers, EVENT_TYPE_HEADER),
        content_type: header_value(&headers, header::CONTENT_TYPE.as_str()),
        correlation_id: header_value(&headers, CORRELATION_ID_HEADER),
        routing_key: header_value(&headers, ROUTING_KEY_HEADER),
        body: body.to_vec(),
    };

    let (status, outcome) = match consumer.consume(&delivery).await {
        Outcome::Ack => (StatusCode::OK, "ack"),
        Outcome::Requeue => (StatusCode::SERVICE_UNAVAILABLE, "requeue"),
    };
    Ok((
        status,
        Json(DeliveryResponse {
            consumer: consumer.name(),
            outcome,
        }),
    ))
}
