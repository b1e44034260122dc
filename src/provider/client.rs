use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use super::types::{fold_connection_state, ConnectionStatus, InstanceOutcome, MediaKind, ProviderChat, QrResponse};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Upstream4xx { status: u16, body: String },
}

/// Wraps the upstream provider's REST surface. Timeouts are generous: some
/// listing operations stream large catalogues, and callers (the sync
/// coordinator) rely on their own cancellation discipline rather than short
/// client timeouts.
pub struct ProviderClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl ProviderClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30 * 60))
            .user_agent("wa-gateway/1.0")
            .build()
            .expect("failed to build provider HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn apikey_header(&self) -> (&'static str, String) {
        ("apikey", self.api_key.clone())
    }

    pub async fn ensure_instance(&self, name: &str) -> Result<InstanceOutcome, ProviderError> {
        metrics::counter!("provider_requests_total", 1, "op" => "ensure_instance");
        let resp = self
            .http
            .post(self.url(&format!("instance/create/{name}")))
            .header(self.apikey_header().0, self.apikey_header().1)
            .json(&json!({ "instanceName": name }))
            .send()
            .await?;

        if resp.status() == StatusCode::CONFLICT {
            return Ok(InstanceOutcome::AlreadyExists);
        }
        if !resp.status().is_success() {
            return Err(classify_error_status(resp).await);
        }
        Ok(InstanceOutcome::Created)
    }

    pub async fn request_qr(&self, name: &str) -> Result<QrResponse, ProviderError> {
        metrics::counter!("provider_requests_total", 1, "op" => "request_qr");
        let resp = self
            .http
            .get(self.url(&format!("instance/connect/{name}")))
            .header(self.apikey_header().0, self.apikey_header().1)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_error_status(resp).await);
        }

        let body: serde_json::Value = resp.json().await?;
        let payload = body
            .get("base64")
            .or_else(|| body.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let kind = if body.get("base64").is_some() { "base64-image" } else { "textual-code" };

        Ok(QrResponse {
            payload,
            kind: kind.to_string(),
            expires_in: 60,
        })
    }

    pub async fn connection_status(&self, name: &str) -> Result<ConnectionStatus, ProviderError> {
        metrics::counter!("provider_requests_total", 1, "op" => "connection_status");
        let resp = self
            .http
            .get(self.url(&format!("instance/connectionState/{name}")))
            .header(self.apikey_header().0, self.apikey_header().1)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_error_status(resp).await);
        }

        let body: serde_json::Value = resp.json().await?;
        let native = body
            .get("instance")
            .and_then(|i| i.get("state"))
            .and_then(|s| s.as_str())
            .unwrap_or("close");
        let phone = body
            .get("instance")
            .and_then(|i| i.get("phone"))
            .and_then(|p| p.as_str())
            .map(|s| s.to_string());

        Ok(ConnectionStatus {
            state: fold_connection_state(native),
            phone,
        })
    }

    pub async fn disconnect(&self, name: &str) -> Result<(), ProviderError> {
        metrics::counter!("provider_requests_total", 1, "op" => "disconnect");
        let resp = self
            .http
            .delete(self.url(&format!("instance/logout/{name}")))
            .header(self.apikey_header().0, self.apikey_header().1)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_error_status(resp).await);
        }
        Ok(())
    }

    /// Tries the primary endpoint, then a fall-back endpoint, returning the
    /// union without duplicates. Errors from either attempt are logged and
    /// never abort the other attempt.
    pub async fn list_groups(&self, name: &str) -> Vec<ProviderChat> {
        self.list_with_fallback(
            &format!("group/fetchAllGroups/{name}"),
            &format!("chat/findGroups/{name}"),
            "groups",
        )
        .await
    }

    pub async fn list_contacts(&self, name: &str) -> Vec<ProviderChat> {
        self.list_with_fallback(
            &format!("chat/findContacts/{name}"),
            &format!("contact/fetchAll/{name}"),
            "contacts",
        )
        .await
    }

    async fn list_with_fallback(&self, primary: &str, fallback: &str, what: &str) -> Vec<ProviderChat> {
        let mut seen = HashMap::new();

        let (primary_result, fallback_result) =
            futures::join!(self.fetch_chat_list(primary), self.fetch_chat_list(fallback));

        match primary_result {
            Ok(items) => {
                for item in items {
                    seen.insert(item.id.clone(), item);
                }
            }
            Err(e) => warn!("primary {what} endpoint failed: {e}"),
        }

        match fallback_result {
            Ok(items) => {
                for item in items {
                    seen.entry(item.id.clone()).or_insert(item);
                }
            }
            Err(e) => warn!("fallback {what} endpoint failed: {e}"),
        }

        seen.into_values().collect()
    }

    async fn fetch_chat_list(&self, path: &str) -> Result<Vec<ProviderChat>, ProviderError> {
        metrics::counter!("provider_requests_total", 1, "op" => "list");
        let resp = self
            .http
            .get(self.url(path))
            .header(self.apikey_header().0, self.apikey_header().1)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_error_status(resp).await);
        }

        let body: Vec<serde_json::Value> = resp.json().await.unwrap_or_default();
        Ok(body
            .into_iter()
            .filter_map(|v| {
                let id = v.get("id").and_then(|i| i.as_str())?.to_string();
                Some(ProviderChat {
                    id,
                    name: v.get("name").and_then(|n| n.as_str()).map(|s| s.to_string()),
                    phone_number: v.get("phoneNumber").and_then(|n| n.as_str()).map(|s| s.to_string()),
                })
            })
            .collect())
    }

    pub async fn send_text(&self, name: &str, to: &str, text: &str) -> Result<String, ProviderError> {
        metrics::counter!("provider_requests_total", 1, "op" => "send_text");
        let resp = self
            .http
            .post(self.url(&format!("message/sendText/{name}")))
            .header(self.apikey_header().0, self.apikey_header().1)
            .json(&json!({ "number": to, "text": text }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_error_status(resp).await);
        }

        let body: serde_json::Value = resp.json().await?;
        Ok(body
            .get("key")
            .and_then(|k| k.get("id"))
            .and_then(|i| i.as_str())
            .unwrap_or_default()
            .to_string())
    }

    pub async fn send_media(
        &self,
        name: &str,
        to: &str,
        url: &str,
        kind: MediaKind,
        caption: Option<&str>,
    ) -> Result<String, ProviderError> {
        metrics::counter!("provider_requests_total", 1, "op" => "send_media");
        let media_type = match kind {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
        };

        let resp = self
            .http
            .post(self.url(&format!("message/sendMedia/{name}")))
            .header(self.apikey_header().0, self.apikey_header().1)
            .json(&json!({
                "number": to,
                "mediatype": media_type,
                "media": url,
                "caption": caption,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_error_status(resp).await);
        }

        let body: serde_json::Value = resp.json().await?;
        Ok(body
            .get("key")
            .and_then(|k| k.get("id"))
            .and_then(|i| i.as_str())
            .unwrap_or_default()
            .to_string())
    }

    pub async fn configure_webhook(&self, name: &str, url: &str, event_kinds: &[String]) -> Result<(), ProviderError> {
        metrics::counter!("provider_requests_total", 1, "op" => "configure_webhook");
        let resp = self
            .http
            .post(self.url(&format!("webhook/set/{name}")))
            .header(self.apikey_header().0, self.apikey_header().1)
            .json(&json!({ "url": url, "events": event_kinds, "enabled": true }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_error_status(resp).await);
        }
        Ok(())
    }

    pub async fn apply_settings(&self, name: &str, settings: serde_json::Value) -> Result<(), ProviderError> {
        metrics::counter!("provider_requests_total", 1, "op" => "apply_settings");
        let resp = self
            .http
            .post(self.url(&format!("settings/set/{name}")))
            .header(self.apikey_header().0, self.apikey_header().1)
            .json(&settings)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_error_status(resp).await);
        }
        Ok(())
    }
}

async fn classify_error_status(resp: reqwest::Response) -> ProviderError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ProviderError::Upstream4xx { status, body }
}
