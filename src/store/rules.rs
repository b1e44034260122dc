use chrono::Utc;
use sqlx::PgPool;

use super::{RuleSetRow, StoreError};

/// Fetch the canonical YAML text of the singleton rule set. Returns an empty
/// string if no rule set has ever been saved (the "initialised empty on
/// first boot" lifecycle).
pub async fn get_ruleset_yaml(pool: &PgPool) -> Result<String, StoreError> {
    let row = sqlx::query_as::<_, RuleSetRow>(
        "SELECT id, yaml_text, version, updated_at FROM rule_sets WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.yaml_text).unwrap_or_default())
}

pub async fn get_ruleset_version(pool: &PgPool) -> Result<i64, StoreError> {
    let row = sqlx::query_as::<_, RuleSetRow>(
        "SELECT id, yaml_text, version, updated_at FROM rule_sets WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.version).unwrap_or(0))
}

/// Replace the singleton rule set atomically: the version is computed inside
/// this function (current + 1), never taken from the caller, so "version
/// strictly increases on each save" holds regardless of what the caller
/// believes the current version to be.
pub async fn put_ruleset(
    pool: &PgPool,
    yaml_text: &str,
    parsed_json: &serde_json::Value,
) -> Result<i64, StoreError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let current_version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM rule_sets WHERE id = 1 FOR UPDATE")
            .fetch_optional(&mut *tx)
            .await?;
    let new_version = current_version.unwrap_or(0) + 1;

    sqlx::query(
        r#"
        INSERT INTO rule_sets (id, yaml_text, parsed, version, updated_at)
        VALUES (1, $1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE
        SET yaml_text = EXCLUDED.yaml_text,
            parsed = EXCLUDED.parsed,
            version = EXCLUDED.version,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(yaml_text)
    .bind(parsed_json)
    .bind(new_version)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(new_version)
}
