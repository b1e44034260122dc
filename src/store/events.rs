use chrono::Utc;
use sqlx::PgPool;

use super::{EventFilters, EventLogRow, Paged, Pagination, StoreError};

pub struct NewEvent<'a> {
    pub event_kind: &'a str,
    pub instance: &'a str,
    pub chat_id: Option<&'a str>,
    pub sender_id: Option<&'a str>,
    pub summary: &'a str,
    pub raw_payload: serde_json::Value,
}

pub async fn insert_event(pool: &PgPool, event: NewEvent<'_>) -> Result<i64, StoreError> {
    let summary: String = event.summary.chars().take(1000).collect();

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO event_log (event_kind, instance, chat_id, sender_id, summary, raw_payload, received_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(event.event_kind)
    .bind(event.instance)
    .bind(event.chat_id)
    .bind(event.sender_id)
    .bind(summary)
    .bind(event.raw_payload)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

pub async fn list_events(
    pool: &PgPool,
    filters: EventFilters,
    pagination: Pagination,
) -> Result<Paged<EventLogRow>, StoreError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM event_log WHERE ($1::text IS NULL OR event_kind = $1)",
    )
    .bind(filters.event_kind.as_deref())
    .fetch_one(pool)
    .await?;

    let items = sqlx::query_as::<_, EventLogRow>(
        r#"
        SELECT id, event_kind, instance, chat_id, sender_id, summary, raw_payload, received_at
        FROM event_log
        WHERE ($1::text IS NULL OR event_kind = $1)
        ORDER BY received_at DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(filters.event_kind.as_deref())
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
