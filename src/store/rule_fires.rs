use chrono::Utc;
use sqlx::PgPool;

use super::{Paged, Pagination, RuleFireFilters, RuleFireRow, StoreError};

pub struct NewRuleFire<'a> {
    pub rule_id: &'a str,
    pub rule_name: &'a str,
    pub message_id: Option<i64>,
    pub chat_id: &'a str,
    pub sender_id: &'a str,
    pub matched_text: Option<&'a str>,
    pub action_results: serde_json::Value,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Truncate `text` to at most `max` chars (not bytes) on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

pub async fn insert_rule_fire(pool: &PgPool, fire: NewRuleFire<'_>) -> Result<i64, StoreError> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO rule_fires
            (rule_id, rule_name, message_id, chat_id, sender_id, matched_text, action_results, success, error_message, fired_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(fire.rule_id)
    .bind(fire.rule_name)
    .bind(fire.message_id)
    .bind(fire.chat_id)
    .bind(fire.sender_id)
    .bind(fire.matched_text)
    .bind(fire.action_results)
    .bind(fire.success)
    .bind(fire.error_message)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

pub async fn list_rule_fires(
    pool: &PgPool,
    filters: RuleFireFilters,
    pagination: Pagination,
) -> Result<Paged<RuleFireRow>, StoreError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM rule_fires WHERE ($1::text IS NULL OR rule_id = $1)",
    )
    .bind(filters.rule_id.as_deref())
    .fetch_one(pool)
    .await?;

    let items = sqlx::query_as::<_, RuleFireRow>(
        r#"
        SELECT id, rule_id, rule_name, message_id, chat_id, sender_id, matched_text, action_results, success, error_message, fired_at
        FROM rule_fires
        WHERE ($1::text IS NULL OR rule_id = $1)
        ORDER BY fired_at DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(filters.rule_id.as_deref())
    .bind(pagination.limit_i64())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    Ok(Paged {
        items,
        total,
        page: pagination.page,
        limit: pagination.limit,
    })
}
