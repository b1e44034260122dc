//! Environment-driven configuration for the gateway process.

use std::time::Duration;

/// Gateway-wide configuration, assembled once at startup from the process
/// environment (optionally loaded from a `.env` file via `dotenvy`).
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout: Duration,

    pub provider_base_url: String,
    pub provider_api_key: String,
    pub default_instance: String,

    pub orchestrator_base_url: String,
    pub orchestrator_token: String,
    pub allowed_services: Vec<String>,

    pub enable_metrics: bool,
}

impl Config {
    /// Load configuration from environment variables, applying the same
    /// defaults the gateway has always shipped with.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            listen_port: env_parse("GATEWAY_PORT", 8080),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/wa_gateway".to_string()),
            db_max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
            db_min_connections: env_parse("DATABASE_MIN_CONNECTIONS", 2),
            db_acquire_timeout: Duration::from_secs(env_parse("DATABASE_ACQUIRE_TIMEOUT_SECS", 30)),

            provider_base_url: validated_base_url(
                "PROVIDER_BASE_URL",
                "http://localhost:8081",
            )?,
            provider_api_key: std::env::var("PROVIDER_API_KEY").unwrap_or_default(),
            default_instance: std::env::var("PROVIDER_INSTANCE")
                .unwrap_or_else(|_| "default".to_string()),

            orchestrator_base_url: validated_base_url(
                "ORCHESTRATOR_BASE_URL",
                "http://localhost:8123",
            )?,
            orchestrator_token: std::env::var("ORCHESTRATOR_TOKEN").unwrap_or_default(),
            allowed_services: std::env::var("ORCHESTRATOR_ALLOWED_SERVICES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            enable_metrics: matches!(
                std::env::var("ENABLE_METRICS").as_deref(),
                Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes")
            ),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Reads `key` (or falls back to `default`) and rejects it early if it
/// isn't a well-formed absolute URL, so a typo'd endpoint fails at startup
/// rather than on the first outbound request.
fn validated_base_url(key: &str, default: &str) -> anyhow::Result<String> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    let parsed = url::Url::parse(&raw)
        .map_err(|e| anyhow::anyhow!("{key} is not a valid URL: {e}"))?;
    Ok(parsed.to_string())
}
