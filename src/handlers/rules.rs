use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::engine::{yaml::ValidationOutcome, NormalizedEvent};
use crate::error::GatewayError;
use crate::store;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct RulesYamlResponse {
    pub yaml: String,
}

pub async fn get_rules(State(state): State<AppState>) -> Result<Json<RulesYamlResponse>, GatewayError> {
    let yaml = store::rules::get_ruleset_yaml(&state.pool).await?;
    Ok(Json(RulesYamlResponse { yaml }))
}

#[derive(Debug, Deserialize)]
pub struct SaveRulesRequest {
    pub yaml: String,
}

pub async fn put_rules(
    State(state): State<AppState>,
    Json(body): Json<SaveRulesRequest>,
) -> Result<Json<ValidationOutcome>, GatewayError> {
    let outcome = state.engine.save_ruleset(&body.yaml).await?;
    if !outcome.valid {
        return Err(GatewayError::Validation(
            outcome
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "invalid rule set".to_string()),
        ));
    }
    Ok(Json(outcome))
}

pub async fn validate_rules(Json(body): Json<SaveRulesRequest>) -> Json<ValidationOutcome> {
    Json(crate::engine::yaml::validate_yaml(&body.yaml))
}

#[derive(Debug, Deserialize)]
pub struct TestMessageRequest {
    pub message: TestMessagePayload,
}

#[derive(Debug, Deserialize)]
pub struct TestMessagePayload {
    #[serde(default = "default_event_kind")]
    pub event_kind: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    #[serde(default)]
    pub text: String,
}

fn default_event_kind() -> String {
    "MESSAGES_UPSERT".to_string()
}

#[derive(Debug, Serialize)]
pub struct TestMessageResponse {
    pub matched_rules: Vec<String>,
    pub actions_preview: Vec<String>,
}

pub async fn test_message(
    State(state): State<AppState>,
    Json(body): Json<TestMessageRequest>,
) -> Json<TestMessageResponse> {
    let mut event = NormalizedEvent::new(
        body.message.event_kind,
        body.message.chat_id,
        body.message.sender_id,
        body.message.text,
    );
    event.sender_name = body.message.sender_name;

    let result = state.engine.test_message(&event);

    let matched_rules = result.evaluated_rules.iter().map(|r| r.rule_name.clone()).collect();
    let actions_preview = result
        .evaluated_rules
        .iter()
        .flat_map(|r| r.action_results.iter().map(|a| a.description.clone()))
        .collect();

    Json(TestMessageResponse { matched_rules, actions_preview })
}

pub async fn reload_rules(State(state): State<AppState>) -> Result<Json<serde_json::Value>, GatewayError> {
    state.engine.reload().await?;
    Ok(Json(serde_json::json!({ "status": "reloaded" })))
}
