//! Shared error taxonomy for the management HTTP surface.
//!
//! Mirrors the taxonomy in the design notes: validation errors carry enough
//! detail for the caller to fix their input, policy refusals and upstream
//! failures map to distinct status codes, and anything unexpected collapses
//! to 500 without leaking internals.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::{orchestrator::OrchestratorError, provider::ProviderError, store::StoreError};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("policy refused: {0}")]
    PolicyRefused(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => GatewayError::NotFound(msg),
            other => GatewayError::Store(other),
        }
    }
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Transport(e) => GatewayError::Upstream(e.to_string()),
            ProviderError::Upstream4xx { status, body } => {
                GatewayError::Upstream(format!("provider returned {status}: {body}"))
            }
        }
    }
}

impl From<OrchestratorError> for GatewayError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::PolicyRefused(service) => GatewayError::PolicyRefused(format!(
                "service '{service}' is not in the allow-list"
            )),
            OrchestratorError::Transport(e) => GatewayError::Upstream(e.to_string()),
            OrchestratorError::Upstream4xx { status, body } => {
                GatewayError::Upstream(format!("orchestrator returned {status}: {body}"))
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::PolicyRefused(_) => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
