use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::PgPool;

use super::StoreError;

/// `is_on_cooldown` is checked before matching proceeds; it is intentionally
/// NOT atomic with [`set_cooldown`] (see concurrency notes) — under burst
/// conditions a second event arriving inside the window but before the first
/// fire's cooldown insert may still fire, which the spec accepts.
pub async fn is_on_cooldown(pool: &PgPool, rule_id: &str, scope_key: &str) -> Result<bool, StoreError> {
    let expires_at: Option<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT expires_at FROM cooldowns WHERE rule_id = $1 AND scope_key = $2",
    )
    .bind(rule_id)
    .bind(scope_key)
    .fetch_optional(pool)
    .await?;

    Ok(expires_at.map(|e| e > Utc::now()).unwrap_or(false))
}

/// Set (or extend) a cooldown. Implemented as a conditional upsert so that a
/// concurrent caller can never *shorten* an already-set cooldown window.
pub async fn set_cooldown(
    pool: &PgPool,
    rule_id: &str,
    scope_key: &str,
    cooldown_seconds: i64,
) -> Result<(), StoreError> {
    let expires_at = Utc::now() + ChronoDuration::seconds(cooldown_seconds);

    sqlx::query(
        r#"
        INSERT INTO cooldowns (rule_id, scope_key, expires_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (rule_id, scope_key) DO UPDATE
        SET expires_at = EXCLUDED.expires_at
        WHERE cooldowns.expires_at < EXCLUDED.expires_at
        "#,
    )
    .bind(rule_id)
    .bind(scope_key)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Opportunistically remove expired cooldown rows. Safe to call at any time;
/// callers invoke it at the start of each engine check.
pub async fn sweep_expired_cooldowns(pool: &PgPool) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM cooldowns WHERE expires_at < $1")
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
