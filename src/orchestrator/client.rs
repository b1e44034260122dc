use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use thiserror::Error;

use super::types::{AutomationSummary, EntitySummary, OrchestratorStatus, ScriptSummary, ServiceDetails};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("service '{0}' is not in the allow-list")]
    PolicyRefused(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("orchestrator returned {status}: {body}")]
    Upstream4xx { status: u16, body: String },
}

/// Wraps the downstream home-automation orchestrator's REST surface.
pub struct OrchestratorClient {
    http: Client,
    base_url: String,
    token: String,
}

impl OrchestratorClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .user_agent("wa-gateway/1.0")
            .build()
            .expect("failed to build orchestrator HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Checks `allow_list` before building any request; a refused service
    /// never reaches the network.
    pub async fn call_service(
        &self,
        service: &str,
        target: Option<serde_json::Value>,
        data: Option<serde_json::Value>,
        allow_list: &[String],
    ) -> Result<(), OrchestratorError> {
        metrics::counter!("orchestrator_requests_total", 1, "op" => "call_service");
        if !allow_list.iter().any(|s| s == service) {
            return Err(OrchestratorError::PolicyRefused(service.to_string()));
        }

        let (domain, service_name) = service.split_once('.').unwrap_or(("homeassistant", service));

        let mut body = data.unwrap_or_else(|| json!({}));
        if let Some(obj) = body.as_object_mut() {
            match target {
                Some(serde_json::Value::String(entity_id)) => {
                    obj.entry("entity_id").or_insert(json!(entity_id));
                }
                Some(serde_json::Value::Object(fields)) => {
                    for (k, v) in fields {
                        obj.entry(k).or_insert(v);
                    }
                }
                Some(_) | None => {}
            }
        }

        let resp = self
            .http
            .post(self.url(&format!("api/services/{domain}/{service_name}")))
            .header("Authorization", self.bearer())
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_error_status(resp).await);
        }
        Ok(())
    }

    pub async fn list_scripts(&self) -> Result<Vec<ScriptSummary>, OrchestratorError> {
        let states: Vec<serde_json::Value> = self.get_states().await?;
        Ok(states
            .into_iter()
            .filter(|s| s["entity_id"].as_str().is_some_and(|id| id.starts_with("script.")))
            .map(|s| ScriptSummary {
                entity_id: s["entity_id"].as_str().unwrap_or_default().to_string(),
                name: s["attributes"]["friendly_name"].as_str().map(|s| s.to_string()),
            })
            .collect())
    }

    pub async fn list_automations(&self) -> Result<Vec<AutomationSummary>, OrchestratorError> {
        let states: Vec<serde_json::Value> = self.get_states().await?;
        Ok(states
            .into_iter()
            .filter(|s| s["entity_id"].as_str().is_some_and(|id| id.starts_with("automation.")))
            .map(|s| AutomationSummary {
                entity_id: s["entity_id"].as_str().unwrap_or_default().to_string(),
                name: s["attributes"]["friendly_name"].as_str().map(|s| s.to_string()),
                state: s["state"].as_str().map(|s| s.to_string()),
            })
            .collect())
    }

    pub async fn list_entities(&self) -> Result<Vec<EntitySummary>, OrchestratorError> {
        let states: Vec<serde_json::Value> = self.get_states().await?;
        Ok(states
            .into_iter()
            .map(|s| EntitySummary {
                entity_id: s["entity_id"].as_str().unwrap_or_default().to_string(),
                state: s["state"].as_str().map(|s| s.to_string()),
                friendly_name: s["attributes"]["friendly_name"].as_str().map(|s| s.to_string()),
            })
            .collect())
    }

    pub async fn service_details(&self, service: &str) -> Result<ServiceDetails, OrchestratorError> {
        metrics::counter!("orchestrator_requests_total", 1, "op" => "service_details");
        let resp = self
            .http
            .get(self.url("api/services"))
            .header("Authorization", self.bearer())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_error_status(resp).await);
        }

        let domains: serde_json::Value = resp.json().await?;
        let fields = domains
            .as_array()
            .into_iter()
            .flatten()
            .find_map(|domain| {
                domain["services"]
                    .as_object()
                    .and_then(|services| services.get(service))
                    .cloned()
            })
            .unwrap_or_else(|| json!({}));

        Ok(ServiceDetails {
            service: service.to_string(),
            fields,
        })
    }

    pub async fn status(&self) -> OrchestratorStatus {
        metrics::counter!("orchestrator_requests_total", 1, "op" => "status");
        match self
            .http
            .get(self.url("api/"))
            .header("Authorization", self.bearer())
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                let version = resp
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|v| v.get("version").and_then(|x| x.as_str()).map(|s| s.to_string()));
                OrchestratorStatus {
                    reachable: true,
                    version,
                }
            }
            _ => OrchestratorStatus {
                reachable: false,
                version: None,
            },
        }
    }

    async fn get_states(&self) -> Result<Vec<serde_json::Value>, OrchestratorError> {
        metrics::counter!("orchestrator_requests_total", 1, "op" => "get_states");
        let resp = self
            .http
            .get(self.url("api/states"))
            .header("Authorization", self.bearer())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(classify_error_status(resp).await);
        }
        Ok(resp.json().await?)
    }
}

async fn classify_error_status(resp: reqwest::Response) -> OrchestratorError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    OrchestratorError::Upstream4xx { status, body }
}
