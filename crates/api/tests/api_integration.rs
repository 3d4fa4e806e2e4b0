//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use persistence::MemoryDatabase;
use saga::{WorkflowConfig, WorkflowState};
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    state: Arc<AppState>,
    db: MemoryDatabase,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(WorkflowConfig::default())
    }

    fn with_config(config: WorkflowConfig) -> Self {
        let db = MemoryDatabase::new();
        let state = Arc::new(AppState::in_memory(&db, config));
        let app = api::create_app(state.clone(), get_metrics_handle());
        Self { app, state, db }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn delete(&self, uri: &str) -> StatusCode {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .0
    }

    async fn deliver(
        &self,
        service: &str,
        event_type: &str,
        correlation_id: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(format!("/deliveries/{service}"))
                .header("content-type", "application/json")
                .header("x-event-type", event_type)
                .header("x-correlation-id", correlation_id)
                .header("x-routing-key", format!("test.{event_type}"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn create_user(&self, login: &str) -> String {
        let (status, body) = self
            .json("POST", "/users", json!({ "login": login }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["user_id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_check() {
    let t = TestApp::new();

    let (status, body) = t.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["consumers"], json!(["notification", "order", "user"]));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = TestApp::new();
    t.create_user("metrics-probe").await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_create_and_get_user() {
    let t = TestApp::new();

    let (status, body) = t
        .json(
            "POST",
            "/users",
            json!({ "login": "alice", "email": "alice@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["user_id"].as_str().unwrap();

    let (status, user) = t.get(&format!("/users/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["login"], "alice");
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["status"], 0);
    assert!(user["deleted_at"].is_null());
}

#[tokio::test]
async fn test_duplicate_login_is_conflict() {
    let t = TestApp::new();
    t.create_user("alice").await;

    let (status, body) = t.json("POST", "/users", json!({ "login": "alice" })).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("login"));
    assert_eq!(t.db.outbox.records_of_type("user_created").await.len(), 1);
}

#[tokio::test]
async fn test_update_user() {
    let t = TestApp::new();
    let id = t.create_user("bob").await;

    let (status, body) = t
        .json(
            "POST",
            "/users",
            json!({ "id": id, "login": "bobby", "telegram": "@bobby" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], id.as_str());

    let (_, user) = t.get(&format!("/users/{id}")).await;
    assert_eq!(user["login"], "bobby");
    assert_eq!(user["telegram"], "@bobby");
}

#[tokio::test]
async fn test_update_unknown_user_is_not_found() {
    let t = TestApp::new();
    let missing = common::UserId::new();

    let (status, body) = t
        .json("POST", "/users", json!({ "id": missing, "login": "ghost" }))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_user_request_validation() {
    let t = TestApp::new();

    let (status, _) = t.get("/users/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .json("POST", "/users", json!({ "login": "carol", "status": 7 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t.get(&format!("/users/{}", common::UserId::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_soft_and_hard_delete() {
    let t = TestApp::new();
    let id = t.create_user("dave").await;

    assert_eq!(t.delete(&format!("/users/{id}")).await, StatusCode::NO_CONTENT);
    let (status, user) = t.get(&format!("/users/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["status"], 1);
    assert!(user["deleted_at"].is_i64());

    assert_eq!(
        t.delete(&format!("/users/{id}?hard=true")).await,
        StatusCode::NO_CONTENT
    );
    let (status, _) = t.get(&format!("/users/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deleting an absent user is a no-op.
    assert_eq!(
        t.delete(&format!("/users/{id}?hard=true")).await,
        StatusCode::NO_CONTENT
    );
}

#[tokio::test]
async fn test_balance_round_trip() {
    let t = TestApp::new();
    let id = t.create_user("erin").await;
    let uri = format!("/users/{id}/balance");

    let (status, _) = t.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.json("PUT", &uri, json!({ "balance": 500 })).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = t.json("PUT", &uri, json!({ "balance": 750 })).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = t.get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 750);
    assert_eq!(body["user_id"], id.as_str());
}

#[tokio::test]
async fn test_product_lifecycle() {
    let t = TestApp::new();

    let (status, body) = t
        .json("POST", "/products", json!({ "name": "book", "price": 1500 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let book = body["product_id"].as_str().unwrap().to_string();

    let (status, _) = t
        .json("POST", "/products", json!({ "name": "pen", "price": 200 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = t
        .json(
            "PUT",
            &format!("/products/{book}"),
            json!({ "name": "pen", "price": 1500 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .json(
            "PUT",
            &format!("/products/{book}"),
            json!({ "name": "book", "description": "hardcover", "price": 1800 }),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, product) = t.get(&format!("/products/{book}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["price"], 1800);
    assert_eq!(product["description"], "hardcover");

    assert_eq!(
        t.delete(&format!("/products/{book}")).await,
        StatusCode::NO_CONTENT
    );
    let (status, _) = t.get(&format!("/products/{book}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_flow_through_replicas() {
    let t = TestApp::new();
    let user_id = common::UserId::new();
    let book = common::ProductId::new();

    let (status, body) = t
        .deliver(
            "order",
            "user_created",
            "c1",
            json!({ "user_id": user_id, "login": "frank", "status": 0, "created_at": 1_700_000_000 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ack");
    let (status, _) = t
        .deliver(
            "order",
            "product_created",
            "c2",
            json!({ "product_id": book, "name": "book", "price": 1200, "created_at": 1_700_000_000 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t
        .json(
            "POST",
            "/orders",
            json!({ "user_id": user_id, "items": [{ "product_id": book, "quantity": 2 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = body["order_id"].as_str().unwrap().to_string();

    let (status, order) = t.get(&format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["total_price"], 2400);
    assert_eq!(order["status_name"], "Open");
    assert_eq!(order["items"][0]["price"], 1200);

    let status_uri = format!("/orders/{order_id}/status");
    let (status, _) = t.json("PUT", &status_uri, json!({ "status": 1 })).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = t.json("PUT", &status_uri, json!({ "status": 0 })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = t.json("PUT", &status_uri, json!({ "status": 9 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_validation_errors() {
    let t = TestApp::new();
    let user_id = common::UserId::new();

    let (status, _) = t
        .json("POST", "/orders", json!({ "user_id": user_id, "items": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t
        .json(
            "POST",
            "/orders",
            json!({ "user_id": user_id, "items": [{ "product_id": common::ProductId::new(), "quantity": 1 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = t.get(&format!("/orders/{}", common::OrderId::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delivery_routing() {
    let t = TestApp::new();

    let (status, _) = t.deliver("billing", "user_created", "c1", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = t
        .deliver("user", "unknown_event_v2", "c1", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ack");
    assert_eq!(body["consumer"], "userservice");

    let (status, _) = t.get("/workflows/c1_del").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_created_delivery_notifies_user() {
    let t = TestApp::new();
    let user_id = common::UserId::new();
    let event = json!({
        "order_id": common::OrderId::new(),
        "user_id": user_id,
        "items": [],
        "total_price": 0,
        "created_at": 1_700_000_000,
    });

    for _ in 0..2 {
        let (status, _) = t
            .deliver("notification", "order_created", "c5", event.clone())
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = t.get(&format!("/users/{user_id}/notifications")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["message"], "Order created");
}

#[tokio::test]
async fn test_soft_delete_starts_one_workflow() {
    let t = TestApp::new();
    let user_id = common::UserId::new();
    let event = json!({ "user_id": user_id, "hard": false, "deleted_at": 1_700_000_000 });

    for _ in 0..2 {
        let (status, body) = t.deliver("user", "user_deleted", "c1", event.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "ack");
    }

    let (status, workflow) = t.get("/workflows/c1_del").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(workflow["user_id"], json!(user_id));
    assert!(matches!(
        workflow["state"].as_str().unwrap(),
        "Pending" | "Waiting"
    ));

    let (status, _) = t.json("POST", "/workflows/c1_del/retry", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    t.state.workflows.shutdown().await;
}

#[tokio::test]
async fn test_soft_deleted_user_is_hard_deleted_after_grace_period() {
    let t = TestApp::with_config(WorkflowConfig {
        grace_period: Duration::from_millis(50),
        ..WorkflowConfig::default()
    });
    let id = t.create_user("gina").await;
    assert_eq!(t.delete(&format!("/users/{id}")).await, StatusCode::NO_CONTENT);

    let deleted = t.db.outbox.records_of_type("user_deleted").await;
    assert_eq!(deleted.len(), 1);
    let event: Value = serde_json::from_str(&deleted[0].payload).unwrap();

    let (status, _) = t.deliver("user", "user_deleted", "c9", event).await;
    assert_eq!(status, StatusCode::OK);

    let state = t.state.workflows.wait("c9_del").await.unwrap();
    assert_eq!(state, WorkflowState::Completed);

    let (status, _) = t.get(&format!("/users/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, workflow) = t.get("/workflows/c9_del").await;
    assert_eq!(workflow["state"], "Completed");
    assert_eq!(workflow["attempts"], 1);
}
