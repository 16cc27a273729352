use board_service::{
    build_router,
    config::{BoardConfig, StoreBackend},
    services::{
        metrics::init_metrics, AdminNotifier, InMemoryRevocationLedger, MemoryStore,
        MessageStore, NoopNotifier, RedisStore, RevocationLedger, SmtpNotifier, UserStore,
    },
    AppState,
};
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = BoardConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    init_metrics().map_err(|e| {
        service_core::error::AppError::InternalError(anyhow::anyhow!(
            "Failed to install metrics recorder: {}",
            e
        ))
    })?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        backend = ?config.store.backend,
        "Starting board service"
    );

    let mut sweeper = None;
    let (users, messages, ledger): (
        Arc<dyn UserStore>,
        Arc<dyn MessageStore>,
        Arc<dyn RevocationLedger>,
    ) = match config.store.backend {
        StoreBackend::Redis => {
            let redis = Arc::new(RedisStore::new(&config.store.redis_url).await?);
            let users: Arc<dyn UserStore> = redis.clone();
            let messages: Arc<dyn MessageStore> = redis.clone();
            let ledger: Arc<dyn RevocationLedger> = redis;
            (users, messages, ledger)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            let ledger = Arc::new(InMemoryRevocationLedger::new());
            sweeper = Some(ledger.clone().spawn_sweeper(Duration::from_secs(
                config.revocation.sweep_interval_seconds,
            )));
            let users: Arc<dyn UserStore> = store.clone();
            let messages: Arc<dyn MessageStore> = store;
            let ledger: Arc<dyn RevocationLedger> = ledger;
            (users, messages, ledger)
        }
    };

    let notifier: Arc<dyn AdminNotifier> = match &config.notification {
        Some(notification) => Arc::new(SmtpNotifier::new(notification)?),
        None => {
            tracing::info!("SMTP not configured; registration notices disabled");
            Arc::new(NoopNotifier)
        }
    };

    let state = AppState::new(config.clone(), users, messages, ledger, notifier);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
