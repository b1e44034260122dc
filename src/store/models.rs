//! Row types mapped straight from the Store's Postgres schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Group,
    Direct,
}

impl ChatKind {
    /// Derive chat kind from the id's upstream suffix convention.
    pub fn from_chat_id(chat_id: &str) -> Self {
        if chat_id.ends_with("@g.us") {
            ChatKind::Group
        } else {
            ChatKind::Direct
        }
    }

    /// Whether `chat_id` carries one of the suffixes the provider is known to emit.
    pub fn has_known_suffix(chat_id: &str) -> bool {
        chat_id.ends_with("@g.us") || chat_id.ends_with("@s.whatsapp.net") || chat_id.ends_with("@c.us")
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Chat {
    pub id: String,
    pub kind: String,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub enabled: bool,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Message {
    pub id: i64,
    pub provider_message_id: Option<String>,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub text: Option<String>,
    pub message_kind: String,
    pub raw_payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct RuleFireRow {
    pub id: i64,
    pub rule_id: String,
    pub rule_name: String,
    pub message_id: Option<i64>,
    pub chat_id: String,
    pub sender_id: String,
    pub matched_text: Option<String>,
    pub action_results: serde_json::Value,
    pub success: bool,
    pub error_message: Option<String>,
    pub fired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct EventLogRow {
    pub id: i64,
    pub event_kind: String,
    pub instance: String,
    pub chat_id: Option<String>,
    pub sender_id: Option<String>,
    pub summary: String,
    pub raw_payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RuleSetRow {
    pub id: i32,
    pub yaml_text: String,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

/// Paged result envelope shared by every `list_*` Store operation.
#[derive(Debug, Clone, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(50).clamp(1, 500);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        ((self.page - 1) as i64) * self.limit as i64
    }

    pub fn limit_i64(&self) -> i64 {
        self.limit as i64
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatFilters {
    pub kind: Option<ChatKind>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct MessageFilters {
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleFireFilters {
    pub rule_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventFilters {
    pub event_kind: Option<String>,
}
