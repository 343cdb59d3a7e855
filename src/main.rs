use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use ara_message_service::config::Settings;
use ara_message_service::dispatch::{ConsumerPool, ConsumerSettings, MessageConsumer};
use ara_message_service::fixtures;
use ara_message_service::postgres::PostgresPool;
use ara_message_service::queue::create_dispatch_queue;
use ara_message_service::redis::RedisPool;
use ara_message_service::server::{create_app, AppState};
use ara_message_service::shutdown::{GracefulShutdown, ShutdownConfig};
use ara_message_service::store::create_message_store;
use ara_message_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    // Optional infrastructure
    let redis_pool = if settings.queue.backend == "redis" {
        match RedisPool::new(settings.redis.clone()) {
            Ok(pool) => match pool.ping().await {
                Ok(()) => Some(Arc::new(pool)),
                Err(e) => {
                    tracing::warn!(error = %e, url = %pool.url(), "Redis is not reachable");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create Redis pool");
                None
            }
        }
    } else {
        None
    };

    let postgres_pool = if settings.store.backend == "postgres" {
        match PostgresPool::new(&settings.database).await {
            Ok(pool) => {
                tracing::info!(url = %pool.database_url_masked(), "PostgreSQL pool ready");
                Some(pool)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create PostgreSQL pool");
                None
            }
        }
    } else {
        None
    };

    // Backends
    let queue = create_dispatch_queue(&settings.queue, redis_pool);
    let store =
        create_message_store(&settings.store, &settings.database, postgres_pool.as_ref()).await?;
    tracing::info!(
        queue = queue.backend_name(),
        store = store.backend_name(),
        "Backends initialized"
    );

    if settings.store.seed_fixtures {
        fixtures::seed(store.as_ref(), settings.store.fixture_count).await?;
    }

    // Consumer workers
    let (shutdown_tx, _) = broadcast::channel(1);
    let consumer = Arc::new(MessageConsumer::new(
        queue.clone(),
        store.clone(),
        ConsumerSettings::from_config(&settings.queue, &settings.consumer),
    ));
    let workers = ConsumerPool::start(consumer, settings.consumer.workers, &shutdown_tx).await;
    tracing::info!(workers = workers.len(), "Consumer workers started");

    // Create Axum app
    let addr = settings.server_addr();
    let shutdown_config = ShutdownConfig {
        worker_timeout: Duration::from_secs(settings.consumer.shutdown_timeout_seconds),
    };
    let state = AppState::new(settings, queue.clone(), store);
    let app = create_app(state);

    // Start server
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler())
        .await?;

    let result = GracefulShutdown::new(queue, shutdown_tx)
        .with_config(shutdown_config)
        .with_postgres_pool(postgres_pool)
        .execute("server stopped", workers)
        .await;

    if !result.success {
        tracing::warn!("Shutdown finished with workers still running");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler() {
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
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
