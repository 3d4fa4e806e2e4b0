//! HTTP API server for the consistency services.
//!
//! Exposes the user, account, product, order and notification use cases,
//! accepts bus deliveries for the inbound consumers, and lets operators
//! inspect and retry hard-delete workflows. Structured logging goes through
//! `tracing`; Prometheus metrics are rendered at `/metrics`.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{RetryPolicy, WorkflowConfig};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/users", post(routes::users::store))
        .route(
            "/users/{id}",
            get(routes::users::get).delete(routes::users::delete),
        )
        .route(
            "/users/{id}/balance",
            get(routes::users::get_balance).put(routes::users::store_balance),
        )
        .route(
            "/users/{id}/notifications",
            get(routes::users::notifications),
        )
        .route("/products", post(routes::products::create))
        .route(
            "/products/{id}",
            get(routes::products::get)
                .put(routes::products::update)
                .delete(routes::products::delete),
        )
        .route("/orders", post(routes::orders::create))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/status", put(routes::orders::update_status))
        .route("/deliveries/{service}", post(routes::deliveries::deliver))
        .route("/workflows/{id}", get(routes::workflows::get))
        .route("/workflows/{id}/retry", post(routes::workflows::retry))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Workflow settings derived from the server configuration.
pub fn workflow_config(config: &Config) -> WorkflowConfig {
    WorkflowConfig {
        grace_period: config.grace_period,
        retry: RetryPolicy::default().with_max_attempts(config.activity_max_attempts),
    }
}
