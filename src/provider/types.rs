use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Qr,
    Connected,
}

/// Folds the upstream's native connection-state vocabulary into the
/// gateway's own. Anything unrecognised is treated as disconnected.
pub fn fold_connection_state(native: &str) -> ConnectionState {
    match native {
        "open" => ConnectionState::Connected,
        "connecting" => ConnectionState::Connecting,
        "close" => ConnectionState::Disconnected,
        _ => ConnectionState::Disconnected,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Serialize)]
pub struct QrResponse {
    pub payload: String,
    pub kind: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderChat {
    pub id: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Document,
    Audio,
}
