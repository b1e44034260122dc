//! Normalises inbound provider events, logs them, extracts message content,
//! deduplicates, persists, and hands a normalised event to the Rule Engine.

mod extract;

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::engine::NormalizedEvent;
use crate::handlers::AppState;
use crate::store;

pub use extract::normalise_event_kind;
use extract::extract_fields;

#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    pub instance: String,
    #[serde(default)]
    pub data: Value,
}

/// `POST /webhook/provider`. Always replies 200: the upstream provider must
/// never see a failure here, or it will retry an event we already recorded.
pub async fn ingest(State(state): State<AppState>, Json(envelope): Json<WebhookEnvelope>) -> &'static str {
    if let Err(e) = handle_envelope(&state, envelope).await {
        error!("webhook ingestion failed: {e}");
    }
    "ok"
}

async fn handle_envelope(state: &AppState, envelope: WebhookEnvelope) -> anyhow::Result<()> {
    let event_kind = normalise_event_kind(&envelope.event);
    metrics::counter!("webhook_events_total", 1, "event_kind" => event_kind.clone());
    let fields = extract_fields(&event_kind, &envelope.data);

    store::events::insert_event(
        &state.pool,
        store::events::NewEvent {
            event_kind: &event_kind,
            instance: &envelope.instance,
            chat_id: fields.chat_id.as_deref(),
            sender_id: fields.sender_id.as_deref(),
            summary: &fields.summary,
            raw_payload: envelope.data.clone(),
        },
    )
    .await?;

    if event_kind == "MESSAGES_UPSERT" {
        handle_message_upsert(state, &envelope.data).await?;
        return Ok(());
    }

    let (chat_id, sender_id) = match (fields.chat_id, fields.sender_id) {
        (Some(chat_id), Some(sender_id)) => (chat_id, sender_id),
        _ => return Ok(()),
    };

    let event = NormalizedEvent::new(event_kind, chat_id, sender_id, String::new());
    state.engine.process_event(&event, None).await?;

    Ok(())
}

async fn handle_message_upsert(state: &AppState, data: &Value) -> anyhow::Result<()> {
    let from_me = data["key"]["fromMe"].as_bool().unwrap_or(false);
    if from_me {
        return Ok(());
    }

    let text = extract::extract_message_text(data);
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return Ok(());
    };

    let chat_id = data["key"]["remoteJid"].as_str().unwrap_or_default().to_string();
    if chat_id.is_empty() {
        return Ok(());
    }

    let sender_id = data["key"]["participant"]
        .as_str()
        .filter(|s| !s.is_empty())
        .unwrap_or(&chat_id)
        .to_string();
    let sender_name = data["pushName"].as_str().map(|s| s.to_string());
    let provider_message_id = data["key"]["id"].as_str().map(|s| s.to_string());

    let inserted = store::messages::insert_message(
        &state.pool,
        store::messages::NewMessage {
            provider_message_id: provider_message_id.as_deref(),
            chat_id: &chat_id,
            sender_id: &sender_id,
            sender_name: sender_name.as_deref(),
            text: Some(&text),
            message_kind: "text",
            raw_payload: data.clone(),
        },
    )
    .await?;

    let Some(message) = inserted else {
        warn!(provider_message_id = ?provider_message_id, "duplicate message, skipping");
        return Ok(());
    };

    store::chats::upsert_chat_from_event(&state.pool, &chat_id, sender_name.as_deref()).await?;

    let mut event = NormalizedEvent::new("MESSAGES_UPSERT", chat_id.clone(), sender_id, text);
    event.sender_name = sender_name;
    event.provider_message_id = provider_message_id;

    state.engine.process_event(&event, Some(message.id)).await?;
    store::messages::mark_message_processed(&state.pool, message.id).await?;

    Ok(())
}
