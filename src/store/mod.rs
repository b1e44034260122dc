//! Persistent relational backing for chats, messages, the rule set,
//! cooldowns, rule-fire records and the event log.
//!
//! Every operation here is typed: a duplicate provider message id is reported
//! to the caller as `Ok(None)` from `insert_message` rather than an error (the
//! row is a genuine no-op, not a constraint violation worth its own
//! [`StoreError`] variant), while connection/transport failures propagate as
//! [`StoreError::Transport`] and missing rows as [`StoreError::NotFound`].
//! Timestamps are always generated inside these functions with
//! [`chrono::Utc::now`] — callers never get to supply
//! `updated_at`/`received_at` themselves.

pub mod chats;
pub mod cooldowns;
pub mod events;
pub mod messages;
pub mod models;
pub mod rule_fires;
pub mod rules;
pub mod sync_reconcile;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;

pub use models::*;

pub type DbPool = PgPool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

/// Connect, configure the pool, and run migrations.
pub async fn init_pool(config: DbConfig) -> anyhow::Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
