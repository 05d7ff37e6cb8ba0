//! RelayCore Server
//!
//! Production server for the platform REST APIs plus the webhook
//! delivery pipeline (dispatcher, retry sweeper, endpoint health).
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RC_API_PORT` | `8080` | HTTP API port |
//! | `RC_DATABASE_URL` | `postgres://localhost/relaycore` | Postgres connection URL |
//! | `RC_DB_MAX_CONNECTIONS` | `10` | Connection pool size |
//! | `RC_WEBHOOK_FAILURE_THRESHOLD` | `5` | Terminal failures before an endpoint is disabled |
//! | `RC_RETRY_BASE_DELAY_SECS` | `60` | First retry delay |
//! | `RC_RETRY_MAX_DELAY_SECS` | `86400` | Backoff cap |
//! | `RC_SWEEP_INTERVAL_SECS` | `30` | Retry sweep poll interval |
//! | `RC_SWEEP_BATCH_SIZE` | `100` | Max retries claimed per sweep |
//! | `RC_SWEEP_STUCK_TIMEOUT_SECS` | `300` | Age before an in-flight delivery is re-queued |
//! | `RUST_LOG` | `info` | Log level |

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use rc_platform::api::{
    audit_logs_router, config_router, feature_flags_router, health_router, logs_router,
    notifications_router, webhook_deliveries_router, webhook_endpoints_router,
    webhook_subscriptions_router, ApiDoc, AuditLogsState, ConfigState, FeatureFlagsState,
    HealthState, LogsState, NotificationsState, WebhookDeliveriesState, WebhookEndpointsState,
    WebhookSubscriptionsState,
};
use rc_platform::repository::{
    init_schema, seed_defaults, AuditLogRepository, ConfigRepository, FeatureFlagRepository,
    LogEntryRepository, NotificationRepository,
};
use rc_platform::service::{AuditService, EventEmitter};
use rc_webhooks::{
    Dispatcher, DispatcherConfig, HealthConfig, HealthTracker, PostgresWebhookStore, RetryPolicy,
    RetryScheduler, RetrySweeper, SweepConfig,
};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Starting RelayCore Server");

    let api_port: u16 = env_or_parse("RC_API_PORT", 8080);
    let database_url = env_or("RC_DATABASE_URL", "postgres://localhost/relaycore");
    let max_connections: u32 = env_or_parse("RC_DB_MAX_CONNECTIONS", 10);

    info!("Connecting to Postgres");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&database_url)
        .await?;

    let webhook_store = Arc::new(PostgresWebhookStore::new(pool.clone()));
    webhook_store.init_schema().await?;
    init_schema(&pool).await?;
    seed_defaults(&pool).await?;
    info!("Database schema ready");

    // Webhook delivery pipeline
    let retry_policy = RetryPolicy::new(
        Duration::from_secs(env_or_parse("RC_RETRY_BASE_DELAY_SECS", 60)),
        Duration::from_secs(env_or_parse("RC_RETRY_MAX_DELAY_SECS", 86400)),
    );
    let health_config = HealthConfig {
        failure_threshold: env_or_parse("RC_WEBHOOK_FAILURE_THRESHOLD", 5),
    };
    let dispatcher = Arc::new(Dispatcher::new(
        webhook_store.clone(),
        RetryScheduler::new(retry_policy),
        HealthTracker::new(webhook_store.clone(), health_config),
        DispatcherConfig::default(),
    )?);

    let sweep_config = SweepConfig {
        poll_interval: Duration::from_secs(env_or_parse("RC_SWEEP_INTERVAL_SECS", 30)),
        batch_size: env_or_parse("RC_SWEEP_BATCH_SIZE", 100),
        stuck_timeout: Duration::from_secs(env_or_parse("RC_SWEEP_STUCK_TIMEOUT_SECS", 300)),
    };
    let sweeper = RetrySweeper::new(
        webhook_store.clone(),
        dispatcher.as_ref().clone(),
        sweep_config,
    );
    tokio::spawn(sweeper.start());
    info!("Retry sweeper started");

    // Repositories and services
    let config_repo = Arc::new(ConfigRepository::new(pool.clone()));
    let flag_repo = Arc::new(FeatureFlagRepository::new(pool.clone()));
    let audit_log_repo = Arc::new(AuditLogRepository::new(pool.clone()));
    let log_repo = Arc::new(LogEntryRepository::new(pool.clone()));
    let notification_repo = Arc::new(NotificationRepository::new(pool.clone()));

    let audit = AuditService::new(audit_log_repo.clone());
    let events = EventEmitter::new(dispatcher.clone());

    // API states
    let config_state = ConfigState {
        config_repo,
        audit: audit.clone(),
        events: events.clone(),
    };
    let flags_state = FeatureFlagsState {
        flag_repo,
        audit: audit.clone(),
        events: events.clone(),
    };
    let endpoints_state = WebhookEndpointsState {
        store: webhook_store.clone(),
        audit: audit.clone(),
    };
    let subscriptions_state = WebhookSubscriptionsState {
        store: webhook_store.clone(),
        audit: audit.clone(),
    };
    let deliveries_state = WebhookDeliveriesState {
        store: webhook_store,
        dispatcher,
    };
    let audit_logs_state = AuditLogsState { audit_log_repo };
    let logs_state = LogsState { log_repo };
    let notifications_state = NotificationsState { notification_repo };
    let health_state = HealthState { pool };

    let app = Router::new()
        .nest("/api/v1/config", config_router(config_state))
        .nest("/api/v1/feature-flags", feature_flags_router(flags_state))
        .nest(
            "/api/v1/webhooks/endpoints",
            webhook_endpoints_router(endpoints_state),
        )
        .nest(
            "/api/v1/webhooks/subscriptions",
            webhook_subscriptions_router(subscriptions_state),
        )
        .nest(
            "/api/v1/webhooks/deliveries",
            webhook_deliveries_router(deliveries_state),
        )
        .nest("/api/v1/audit-logs", audit_logs_router(audit_logs_state))
        .nest("/api/v1/logs", logs_router(logs_state))
        .nest("/api/v1/notifications", notifications_router(notifications_state))
        .merge(health_router(health_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let api_addr = format!("0.0.0.0:{}", api_port);
    info!("API server listening on http://{}", api_addr);

    let listener = TcpListener::bind(&api_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("RelayCore Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
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
}
