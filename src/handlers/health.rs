use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use once_cell::sync::Lazy;
use serde::Serialize;
use sqlx::PgPool;

static PROCESS_START: Lazy<Instant> = Lazy::new(Instant::now);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    uptime_seconds: u64,
}

/// `GET /api/health`. Liveness only — does not probe the database.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        uptime_seconds: PROCESS_START.elapsed().as_secs(),
    })
}

pub async fn readiness(State(pool): State<PgPool>) -> StatusCode {
    match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
