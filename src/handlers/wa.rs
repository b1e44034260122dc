use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::provider::MediaKind;
use crate::store::{self, models::ChatKind, Chat, ChatFilters, Paged, Pagination};
use crate::sync::{SyncProgress, StartOutcome};

use super::AppState;

#[derive(Debug, Serialize)]
pub struct WaStatusResponse {
    pub instance_name: String,
    pub evolution_status: String,
    pub evolution_connected: bool,
}

pub async fn status(State(state): State<AppState>) -> Result<Json<WaStatusResponse>, GatewayError> {
    let status = state.provider.connection_status(&state.config.default_instance).await?;
    Ok(Json(WaStatusResponse {
        instance_name: state.config.default_instance.clone(),
        evolution_status: format!("{:?}", status.state).to_ascii_lowercase(),
        evolution_connected: matches!(status.state, crate::provider::ConnectionState::Connected),
    }))
}

pub async fn ensure_instance(State(state): State<AppState>) -> Result<Json<serde_json::Value>, GatewayError> {
    let outcome = state.provider.ensure_instance(&state.config.default_instance).await?;
    Ok(Json(serde_json::json!({ "outcome": outcome })))
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub qr: String,
    pub qr_type: String,
    pub expires_in: u64,
}

pub async fn connect_instance(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ConnectResponse>, GatewayError> {
    let qr = state.provider.request_qr(&name).await?;
    Ok(Json(ConnectResponse {
        qr: qr.payload,
        qr_type: qr.kind,
        expires_in: qr.expires_in,
    }))
}

pub async fn instance_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<crate::provider::ConnectionStatus>, GatewayError> {
    Ok(Json(state.provider.connection_status(&name).await?))
}

pub async fn disconnect_instance(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    state.provider.disconnect(&name).await?;
    Ok(Json(serde_json::json!({ "status": "disconnected" })))
}

#[derive(Debug, Deserialize)]
pub struct ChatsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub enabled: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn list_chats(
    State(state): State<AppState>,
    Query(query): Query<ChatsQuery>,
) -> Result<Json<Paged<Chat>>, GatewayError> {
    let kind = match query.kind.as_deref() {
        Some("group") => Some(ChatKind::Group),
        Some("direct") => Some(ChatKind::Direct),
        _ => None,
    };

    let page = store::chats::list_chats(
        &state.pool,
        ChatFilters { kind, enabled: query.enabled },
        Pagination::new(query.page, query.limit),
    )
    .await?;

    Ok(Json(page))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: StartOutcome,
}

pub async fn refresh_chats(State(state): State<AppState>) -> Json<RefreshResponse> {
    let status = state.sync.start_sync();
    Json(RefreshResponse { status })
}

pub async fn refresh_status(State(state): State<AppState>) -> Json<SyncProgress> {
    Json(state.sync.progress())
}

#[derive(Debug, Deserialize)]
pub struct SetChatEnabled {
    pub enabled: bool,
}

pub async fn set_chat_enabled(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(body): Json<SetChatEnabled>,
) -> Result<Json<Chat>, GatewayError> {
    let chat = store::chats::set_chat_enabled(&state.pool, &chat_id, body.enabled).await?;
    Ok(Json(chat))
}

#[derive(Debug, Deserialize)]
pub struct SendTextRequest {
    pub to: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub message_id: String,
}

pub async fn send_text(
    State(state): State<AppState>,
    Json(body): Json<SendTextRequest>,
) -> Result<Json<SendResponse>, GatewayError> {
    if body.to.trim().is_empty() || body.text.trim().is_empty() {
        return Err(GatewayError::Validation("'to' and 'text' are required".to_string()));
    }

    let message_id = state
        .provider
        .send_text(&state.config.default_instance, &body.to, &body.text)
        .await?;

    Ok(Json(SendResponse { message_id }))
}

#[derive(Debug, Deserialize)]
pub struct SendMediaRequest {
    pub to: String,
    pub media_url: String,
    pub media_type: String,
    pub caption: Option<String>,
}

pub async fn send_media(
    State(state): State<AppState>,
    Json(body): Json<SendMediaRequest>,
) -> Result<Json<SendResponse>, GatewayError> {
    let kind = match body.media_type.as_str() {
        "image" => MediaKind::Image,
        "video" => MediaKind::Video,
        "document" => MediaKind::Document,
        "audio" => MediaKind::Audio,
        other => return Err(GatewayError::Validation(format!("unknown media_type '{other}'"))),
    };

    let message_id = state
        .provider
        .send_media(
            &state.config.default_instance,
            &body.to,
            &body.media_url,
            kind,
            body.caption.as_deref(),
        )
        .await?;

    Ok(Json(SendResponse { message_id }))
}
