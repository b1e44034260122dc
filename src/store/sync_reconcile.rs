use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::{models::ChatKind, StoreError};

/// Begin a transaction for the sync coordinator to perform its upserts and
/// reconciliation in. All multi-row updates during sync happen inside this
/// single transaction.
pub async fn begin(pool: &PgPool) -> Result<Transaction<'_, Postgres>, StoreError> {
    Ok(pool.begin().await?)
}

/// Delete chats whose `updated_at` predates `sync_start` and whose id lacks
/// a suffix the provider is known to emit (`@g.us`, `@s.whatsapp.net`,
/// `@c.us`). Only a stale row with a malformed id is removed by this pass —
/// a stale row with a recognised suffix is left alone, since the provider's
/// own catalogue is the only thing allowed to age those out.
pub async fn sync_reconcile(
    tx: &mut Transaction<'_, Postgres>,
    sync_start: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let candidates: Vec<String> =
        sqlx::query_scalar("SELECT id FROM chats WHERE updated_at < $1")
            .bind(sync_start)
            .fetch_all(&mut **tx)
            .await?;

    let stale: Vec<String> = candidates
        .into_iter()
        .filter(|id| !ChatKind::has_known_suffix(id))
        .collect();

    if stale.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query("DELETE FROM chats WHERE id = ANY($1)")
        .bind(&stale)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected())
}
