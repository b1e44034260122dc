use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower::util::ServiceExt;

use wa_gateway::handlers::health;

fn state_free_router() -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/rules/validate", post(wa_gateway::handlers::rules::validate_rules))
}

#[tokio::test]
async fn health_endpoint_reports_ok_without_touching_state() {
    let app = state_free_router();

    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .expect("failed to build request");

    let response = app.oneshot(request).await.expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn validate_rules_rejects_malformed_yaml_over_http() {
    let app = state_free_router();

    let request = Request::builder()
        .method("POST")
        .uri("/api/rules/validate")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({"yaml": "rules: [not valid"}).to_string()))
        .expect("failed to build request");

    let response = app.oneshot(request).await.expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let outcome: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(outcome["valid"], false);
}
