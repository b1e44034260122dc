use axum::{extract::State, Json};
use serde::Deserialize;

use crate::error::GatewayError;
use crate::orchestrator::{AutomationSummary, EntitySummary, OrchestratorStatus, ScriptSummary};

use super::AppState;

pub async fn status(State(state): State<AppState>) -> Json<OrchestratorStatus> {
    Json(state.orchestrator.status().await)
}

pub async fn scripts(State(state): State<AppState>) -> Result<Json<Vec<ScriptSummary>>, GatewayError> {
    Ok(Json(state.orchestrator.list_scripts().await?))
}

pub async fn automations(State(state): State<AppState>) -> Result<Json<Vec<AutomationSummary>>, GatewayError> {
    Ok(Json(state.orchestrator.list_automations().await?))
}

pub async fn entities(State(state): State<AppState>) -> Result<Json<Vec<EntitySummary>>, GatewayError> {
    Ok(Json(state.orchestrator.list_entities().await?))
}

pub async fn allowed_services(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.config.allowed_services.clone())
}

#[derive(Debug, Deserialize)]
pub struct CallServiceRequest {
    pub service: String,
    pub target: Option<serde_json::Value>,
    pub data: Option<serde_json::Value>,
}

pub async fn call_service(
    State(state): State<AppState>,
    Json(body): Json<CallServiceRequest>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    state
        .orchestrator
        .call_service(&body.service, body.target, body.data, &state.config.allowed_services)
        .await?;

    Ok(Json(serde_json::json!({ "status": "called" })))
}
