use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wa_gateway::{
    config::Config,
    engine::Engine,
    handlers::{ha, health, logs, notify, rules, wa, AppState},
    metrics::MetricsRecorder,
    middleware::{logging::log_requests_middleware, rate_limit::rate_limit_middleware, rate_limit::RateLimiter},
    orchestrator::OrchestratorClient,
    provider::ProviderClient,
    store::{self, DbConfig},
    sync::SyncCoordinator,
    webhook,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&log_level))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("starting wa-gateway");

    let config = Arc::new(Config::from_env()?);

    let metrics_recorder = config.enable_metrics.then(MetricsRecorder::new);
    let metrics_handle = metrics_recorder.as_ref().map(|r| r.handle().clone());

    let pool = store::init_pool(DbConfig {
        database_url: config.database_url.clone(),
        max_connections: config.db_max_connections,
        min_connections: config.db_min_connections,
        acquire_timeout: config.db_acquire_timeout,
    })
    .await
    .map_err(|e| {
        tracing::error!("failed to reach the store at startup: {e}");
        e
    })?;

    tracing::info!("store reachable, migrations applied");

    let provider = Arc::new(ProviderClient::new(config.provider_base_url.clone(), config.provider_api_key.clone()));
    let orchestrator = Arc::new(OrchestratorClient::new(config.orchestrator_base_url.clone(), config.orchestrator_token.clone()));

    let engine = Arc::new(Engine::new(
        pool.clone(),
        provider.clone(),
        orchestrator.clone(),
        config.default_instance.clone(),
        config.allowed_services.clone(),
    ));
    engine.reload().await?;
    tracing::info!("rule engine cache loaded");

    let sync = Arc::new(SyncCoordinator::new(pool.clone(), provider.clone(), config.default_instance.clone()));

    let state = AppState {
        pool: pool.clone(),
        engine,
        provider,
        orchestrator,
        sync,
        config: config.clone(),
    };

    let rate_limiter = RateLimiter::default();
    tokio::spawn({
        let rate_limiter = rate_limiter.clone();
        async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
            loop {
                interval.tick().await;
                rate_limiter.cleanup_old_buckets(std::time::Duration::from_secs(3600)).await;
            }
        }
    });

    if metrics_recorder.is_some() {
        tokio::spawn({
            let pool = pool.clone();
            async move {
                let mut interval = tokio::time::interval(std::time::Duration::from_secs(15));
                loop {
                    interval.tick().await;
                    wa_gateway::metrics::record_pool_metrics(&pool);
                }
            }
        });
    }

    let metrics_router = match metrics_handle {
        Some(handle) => Router::new()
            .route("/metrics", get(wa_gateway::metrics::metrics_handler))
            .with_state(handle),
        None => Router::new(),
    };

    let app = Router::new()
        .route("/api/health", get(health::health))
        .route("/api/health/ready", get(health::readiness).with_state(pool.clone()))
        .route("/api/wa/status", get(wa::status))
        .route("/api/wa/instances", post(wa::ensure_instance))
        .route("/api/wa/instances/:name/connect", post(wa::connect_instance))
        .route("/api/wa/instances/:name/status", get(wa::instance_status))
        .route("/api/wa/instances/:name/disconnect", post(wa::disconnect_instance))
        .route("/api/wa/chats", get(wa::list_chats))
        .route("/api/wa/chats/refresh", post(wa::refresh_chats))
        .route("/api/wa/chats/refresh/status", get(wa::refresh_status))
        .route("/api/wa/chats/:id", patch(wa::set_chat_enabled))
        .route("/api/wa/send", post(wa::send_text))
        .route("/api/wa/send-media", post(wa::send_media))
        .route("/api/ha/status", get(ha::status))
        .route("/api/ha/scripts", get(ha::scripts))
        .route("/api/ha/automations", get(ha::automations))
        .route("/api/ha/entities", get(ha::entities))
        .route("/api/ha/allowed-services", get(ha::allowed_services))
        .route("/api/ha/call-service", post(ha::call_service))
        .route("/api/rules", get(rules::get_rules).put(rules::put_rules))
        .route("/api/rules/validate", post(rules::validate_rules))
        .route("/api/rules/test", post(rules::test_message))
        .route("/api/rules/reload", post(rules::reload_rules))
        .route("/api/logs/messages", get(logs::messages))
        .route("/api/logs/rules", get(logs::rule_fires))
        .route("/api/logs/events", get(logs::events))
        .route("/api/notify/send", post(notify::send))
        .route("/webhook/provider", post(webhook::ingest))
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(log_requests_middleware))
        .layer(axum::middleware::from_fn(wa_gateway::metrics::track_request_metrics))
        .layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit_middleware))
        .with_state(state);

    let port = config.listen_port;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("store connections released, exiting");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
