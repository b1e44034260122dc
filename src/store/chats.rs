use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};

use super::{Chat, ChatFilters, ChatKind, Paged, Pagination, StoreError};

/// Upsert a chat seen on an incoming event: bumps `last_activity_at` and,
/// on first insert only, sets `kind` (derived from the id suffix) and a
/// best-effort display name. Never touches the operator-controlled
/// `enabled` flag.
pub async fn upsert_chat_from_event(
    pool: &PgPool,
    chat_id: &str,
    display_name: Option<&str>,
) -> Result<(), StoreError> {
    let now = Utc::now();
    let kind = match ChatKind::from_chat_id(chat_id) {
        ChatKind::Group => "group",
        ChatKind::Direct => "direct",
    };

    sqlx::query(
        r#"
        INSERT INTO chats (id, kind, display_name, enabled, last_activity_at, updated_at)
        VALUES ($1, $2, $3, true, $4, $4)
        ON CONFLICT (id) DO UPDATE
        SET last_activity_at = EXCLUDED.last_activity_at,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(chat_id)
    .bind(kind)
    .bind(display_name)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Upsert a chat discovered by the sync coordinator, inside its transaction.
/// Collisions are resolved by the caller (merge-by-id happens before this is
/// called); here we just write the winning record.
pub async fn upsert_chat_from_sync(
    tx: &mut Transaction<'_, Postgres>,
    chat_id: &str,
    kind: ChatKind,
    display_name: Option<&str>,
    phone_number: Option<&str>,
) -> Result<(), StoreError> {
    let now = Utc::now();
    let kind_str = match kind {
        ChatKind::Group => "group",
        ChatKind::Direct => "direct",
    };

    sqlx::query(
        r#"
        INSERT INTO chats (id, kind, display_name, phone_number, enabled, last_activity_at, updated_at)
        VALUES ($1, $2, $3, $4, true, $5, $5)
        ON CONFLICT (id) DO UPDATE
        SET kind = EXCLUDED.kind,
            display_name = COALESCE(EXCLUDED.display_name, chats.display_name),
            phone_number = COALESCE(EXCLUDED.phone_number, chats.phone_number),
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(chat_id)
    .bind(kind_str)
    .bind(display_name)
    .bind(phone_number)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn list_chats(
    pool: &PgPool,
    filters: ChatFilters,
    pagination: Pagination,
) -> Result<Paged<Chat>, StoreError> {
    let kind_filter = filters.kind.map(|k| match k {
        ChatKind::Group => "group",
        ChatKind::Direct => "direct",
    });

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM chats
        WHERE ($1::text IS NULL OR kind = $1)
          AND ($2::bool IS NULL OR enabled = $2)
        "#,
    )
    .bind(kind_filter)
    .bind(filters.enabled)
    .fetch_one(pool)
    .await?;

    let items = sqlx::query_as::<_, Chat>(
        r#"
        SELECT id, kind, display_name, phone_number, enabled, last_activity_at, updated_at
        FROM chats
        WHERE ($1::text IS NULL OR kind = $1)
          AND ($2::bool IS NULL OR enabled = $2)
        ORDER BY last_activity_at DESC NULLS LAST
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(kind_filter)
    .bind(filters.enabled)
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

pub async fn set_chat_enabled(pool: &PgPool, chat_id: &str, enabled: bool) -> Result<Chat, StoreError> {
    let chat = sqlx::query_as::<_, Chat>(
        r#"
        UPDATE chats SET enabled = $2, updated_at = $3
        WHERE id = $1
        RETURNING id, kind, display_name, phone_number, enabled, last_activity_at, updated_at
        "#,
    )
    .bind(chat_id)
    .bind(enabled)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    chat.ok_or_else(|| StoreError::NotFound(format!("chat {chat_id}")))
}
