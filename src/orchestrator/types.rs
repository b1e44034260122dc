use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptSummary {
    pub entity_id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationSummary {
    pub entity_id: String,
    pub name: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySummary {
    pub entity_id: String,
    pub state: Option<String>,
    pub friendly_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDetails {
    pub service: String,
    pub fields: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub reachable: bool,
    pub version: Option<String>,
}
