use chrono::Utc;
use sqlx::PgPool;

use super::{Message, MessageFilters, Paged, Pagination, StoreError};

pub struct NewMessage<'a> {
    pub provider_message_id: Option<&'a str>,
    pub chat_id: &'a str,
    pub sender_id: &'a str,
    pub sender_name: Option<&'a str>,
    pub text: Option<&'a str>,
    pub message_kind: &'a str,
    pub raw_payload: serde_json::Value,
}

/// Insert a message, treating a duplicate `provider_message_id` as a no-op
/// (returns `Ok(None)`) rather than an error — this is what makes repeated
/// webhook deliveries of the same event idempotent (P1).
pub async fn insert_message(
    pool: &PgPool,
    msg: NewMessage<'_>,
) -> Result<Option<Message>, StoreError> {
    let now = Utc::now();

    let row = sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages
            (provider_message_id, chat_id, sender_id, sender_name, text, message_kind, raw_payload, received_at, processed)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false)
        ON CONFLICT (provider_message_id) WHERE provider_message_id IS NOT NULL DO NOTHING
        RETURNING id, provider_message_id, chat_id, sender_id, sender_name, text, message_kind, raw_payload, received_at, processed
        "#,
    )
    .bind(msg.provider_message_id)
    .bind(msg.chat_id)
    .bind(msg.sender_id)
    .bind(msg.sender_name)
    .bind(msg.text)
    .bind(msg.message_kind)
    .bind(msg.raw_payload)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn mark_message_processed(pool: &PgPool, message_id: i64) -> Result<(), StoreError> {
    sqlx::query("UPDATE messages SET processed = true WHERE id = $1")
        .bind(message_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_messages(
    pool: &PgPool,
    filters: MessageFilters,
    pagination: Pagination,
) -> Result<Paged<Message>, StoreError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM messages WHERE ($1::text IS NULL OR chat_id = $1)",
    )
    .bind(filters.chat_id.as_deref())
    .fetch_one(pool)
    .await?;

    let items = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, provider_message_id, chat_id, sender_id, sender_name, text, message_kind, raw_payload, received_at, processed
        FROM messages
        WHERE ($1::text IS NULL OR chat_id = $1)
        ORDER BY received_at DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(filters.chat_id.as_deref())
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
