use axum::{extract::State, Json};
use serde::Deserialize;

use crate::error::GatewayError;
use crate::provider::MediaKind;

use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct NotifyData {
    pub image: Option<String>,
    pub document: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub message: String,
    pub target: String,
    pub title: Option<String>,
    #[serde(default)]
    pub data: NotifyData,
}

/// Orchestrator-facing send endpoint. Normalises a bare phone number into a
/// provider JID and, when present, prefixes the message with a bold title.
pub async fn send(
    State(state): State<AppState>,
    Json(body): Json<NotifyRequest>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    let to = normalise_target(&body.target);

    let message = match &body.title {
        Some(title) => format!("*{title}*\n\n{}", body.message),
        None => body.message,
    };

    let message_id = if let Some(url) = &body.data.image {
        state
            .provider
            .send_media(&state.config.default_instance, &to, url, MediaKind::Image, Some(&message))
            .await?
    } else if let Some(url) = &body.data.document {
        state
            .provider
            .send_media(&state.config.default_instance, &to, url, MediaKind::Document, Some(&message))
            .await?
    } else {
        state.provider.send_text(&state.config.default_instance, &to, &message).await?
    };

    Ok(Json(serde_json::json!({ "message_id": message_id })))
}

fn normalise_target(target: &str) -> String {
    if target.contains('@') {
        return target.to_string();
    }
    let digits: String = target.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{digits}@s.whatsapp.net")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_jid_targets_untouched() {
        assert_eq!(normalise_target("1234@g.us"), "1234@g.us");
    }

    #[test]
    fn strips_non_digits_and_appends_suffix() {
        assert_eq!(normalise_target("+1 (555) 123-4567"), "15551234567@s.whatsapp.net");
    }
}
