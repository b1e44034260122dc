use std::sync::Arc;
use std::time::Duration;

use wa_gateway::engine::{Engine, NormalizedEvent};
use wa_gateway::orchestrator::OrchestratorClient;
use wa_gateway::provider::ProviderClient;
use wa_gateway::store::{self, DbConfig};

async fn test_engine() -> Option<(sqlx::PgPool, Arc<Engine>)> {
    let db_url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = store::init_pool(DbConfig {
        database_url: db_url,
        max_connections: 5,
        min_connections: 1,
        acquire_timeout: Duration::from_secs(5),
    })
    .await
    .expect("failed to connect to test database");

    let provider = Arc::new(ProviderClient::new("http://127.0.0.1:1", "unused"));
    let orchestrator = Arc::new(OrchestratorClient::new("http://127.0.0.1:1", "unused"));
    let engine = Arc::new(Engine::new(
        pool.clone(),
        provider,
        orchestrator,
        "default".to_string(),
        vec!["script.turn_on".to_string()],
    ));

    Some((pool, engine))
}

#[tokio::test]
async fn save_ruleset_rejects_invalid_yaml_without_touching_the_cache() {
    let Some((_pool, engine)) = test_engine().await else { return };

    engine.reload().await.unwrap();
    let before = engine.current().version;

    let outcome = engine.save_ruleset("rules: [not valid").await.unwrap();
    assert!(!outcome.valid);
    assert_eq!(engine.current().version, before, "cache must not change on a rejected save");
}

#[tokio::test]
async fn test_message_never_touches_the_store() {
    let Some((pool, engine)) = test_engine().await else { return };

    let yaml = r#"
rules:
  - id: "echo"
    name: "Echo rule"
    cooldown_seconds: 300
    match:
      text:
        mode: contains
        patterns: ["ping"]
    actions:
      - type: reply_whatsapp
        text: "pong"
"#;
    let outcome = engine.save_ruleset(yaml).await.unwrap();
    assert!(outcome.valid, "{:?}", outcome.errors);

    let chat_id = format!("{}@g.us", uuid::Uuid::new_v4());
    let event = NormalizedEvent::new("MESSAGES_UPSERT", chat_id.clone(), "sender@g.us", "ping please");

    let result = engine.test_message(&event);
    assert_eq!(result.evaluated_rules.len(), 1);
    assert!(result.evaluated_rules[0].matched);

    let on_cooldown = store::cooldowns::is_on_cooldown(&pool, "echo", &chat_id).await.unwrap();
    assert!(!on_cooldown, "test_message must not set cooldowns");

    let fires = store::rule_fires::list_rule_fires(
        &pool,
        store::RuleFireFilters { rule_id: Some("echo".to_string()) },
        store::Pagination::new(Some(1), Some(10)),
    )
    .await
    .unwrap();
    assert_eq!(fires.total, 0, "test_message must not record a rule fire");
}
