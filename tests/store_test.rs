use std::time::Duration;

use wa_gateway::store::{self, messages::NewMessage, models::ChatKind, DbConfig, MessageFilters, Pagination};

async fn test_pool() -> Option<sqlx::PgPool> {
    let db_url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = store::init_pool(DbConfig {
        database_url: db_url,
        max_connections: 5,
        min_connections: 1,
        acquire_timeout: Duration::from_secs(5),
    })
    .await
    .expect("failed to connect to test database");
    Some(pool)
}

#[tokio::test]
async fn duplicate_provider_message_id_is_a_no_op() {
    let Some(pool) = test_pool().await else { return };

    let chat_id = format!("dedup-test-{}@g.us", uuid::Uuid::new_v4());
    let provider_message_id = format!("pmid-{}", uuid::Uuid::new_v4());

    let first = store::messages::insert_message(
        &pool,
        NewMessage {
            provider_message_id: Some(&provider_message_id),
            chat_id: &chat_id,
            sender_id: "sender@g.us",
            sender_name: None,
            text: Some("hello"),
            message_kind: "text",
            raw_payload: serde_json::json!({}),
        },
    )
    .await
    .expect("first insert should succeed");
    assert!(first.is_some());

    let second = store::messages::insert_message(
        &pool,
        NewMessage {
            provider_message_id: Some(&provider_message_id),
            chat_id: &chat_id,
            sender_id: "sender@g.us",
            sender_name: None,
            text: Some("hello again"),
            message_kind: "text",
            raw_payload: serde_json::json!({}),
        },
    )
    .await
    .expect("duplicate insert should not error");
    assert!(second.is_none(), "duplicate provider_message_id must be a no-op");

    let page = store::messages::list_messages(
        &pool,
        MessageFilters { chat_id: Some(chat_id) },
        Pagination::new(Some(1), Some(10)),
    )
    .await
    .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn cooldown_suppresses_rule_until_expiry() {
    let Some(pool) = test_pool().await else { return };

    let rule_id = format!("rule-{}", uuid::Uuid::new_v4());
    let scope_key = format!("chat-{}@g.us", uuid::Uuid::new_v4());

    assert!(!store::cooldowns::is_on_cooldown(&pool, &rule_id, &scope_key).await.unwrap());

    store::cooldowns::set_cooldown(&pool, &rule_id, &scope_key, 60).await.unwrap();
    assert!(store::cooldowns::is_on_cooldown(&pool, &rule_id, &scope_key).await.unwrap());

    // A shorter cooldown must never shorten an already-set window.
    store::cooldowns::set_cooldown(&pool, &rule_id, &scope_key, 1).await.unwrap();
    assert!(store::cooldowns::is_on_cooldown(&pool, &rule_id, &scope_key).await.unwrap());
}

#[tokio::test]
async fn sync_reconcile_only_removes_stale_chats_with_unknown_suffix() {
    let Some(pool) = test_pool().await else { return };

    let malformed_id = format!("weird-id-{}", uuid::Uuid::new_v4());
    let valid_id = format!("{}@g.us", uuid::Uuid::new_v4());

    store::chats::upsert_chat_from_event(&pool, &malformed_id, None).await.unwrap();
    store::chats::upsert_chat_from_event(&pool, &valid_id, None).await.unwrap();

    // Backdate both rows so they are older than the sync start instant.
    sqlx::query("UPDATE chats SET updated_at = now() - interval '1 hour' WHERE id = ANY($1)")
        .bind(vec![malformed_id.clone(), valid_id.clone()])
        .execute(&pool)
        .await
        .unwrap();

    let sync_start = chrono::Utc::now();
    let mut tx = store::sync_reconcile::begin(&pool).await.unwrap();
    let removed = store::sync_reconcile::sync_reconcile(&mut tx, sync_start).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(removed, 1, "only the malformed id should be reconciled away");

    let remaining: Vec<String> = sqlx::query_scalar("SELECT id FROM chats WHERE id = ANY($1)")
        .bind(vec![malformed_id, valid_id.clone()])
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, vec![valid_id]);
}

#[tokio::test]
async fn ruleset_version_increases_monotonically_on_save() {
    let Some(pool) = test_pool().await else { return };

    let v1 = store::rules::put_ruleset(&pool, "rules: []", &serde_json::json!({"rules": []}))
        .await
        .unwrap();
    let v2 = store::rules::put_ruleset(&pool, "rules: []", &serde_json::json!({"rules": []}))
        .await
        .unwrap();

    assert!(v2 > v1);
}

#[tokio::test]
async fn chat_kind_is_derived_from_id_suffix() {
    assert_eq!(ChatKind::from_chat_id("123@g.us"), ChatKind::Group);
    assert_eq!(ChatKind::from_chat_id("123@s.whatsapp.net"), ChatKind::Direct);
    assert!(ChatKind::has_known_suffix("123@c.us"));
    assert!(!ChatKind::has_known_suffix("123@unknown.net"));
}
