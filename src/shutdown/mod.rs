//! Graceful shutdown handling for the message service.
//!
//! Runs after the HTTP server has stopped accepting requests:
//! 1. Signal consumer workers to stop after their current delivery
//! 2. Wait for the workers, bounded by a timeout
//! 3. Close the dispatch queue
//! 4. Close the PostgreSQL pool (if one was opened)

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::dispatch::ConsumerPool;
use crate::postgres::PostgresPool;
use crate::queue::DispatchQueue;

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for consumer workers to finish (default: 10 seconds)
    pub worker_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            worker_timeout: Duration::from_secs(10),
        }
    }
}

/// Coordinates the teardown of background components.
pub struct GracefulShutdown {
    queue: Arc<dyn DispatchQueue>,
    postgres_pool: Option<PostgresPool>,
    shutdown_tx: broadcast::Sender<()>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(queue: Arc<dyn DispatchQueue>, shutdown_tx: broadcast::Sender<()>) -> Self {
        Self {
            queue,
            postgres_pool: None,
            shutdown_tx,
            config: ShutdownConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ShutdownConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_postgres_pool(mut self, pool: Option<PostgresPool>) -> Self {
        self.postgres_pool = pool;
        self
    }

    /// Execute the shutdown sequence.
    #[tracing::instrument(name = "graceful_shutdown", skip(self, workers), fields(workers = workers.len()))]
    pub async fn execute(&self, reason: &str, workers: ConsumerPool) -> ShutdownResult {
        let start = Instant::now();
        let mut result = ShutdownResult {
            workers_total: workers.len(),
            ..Default::default()
        };

        // Phase 1: Signal workers
        tracing::info!(reason = %reason, "Starting graceful shutdown - Phase 1: Signaling consumer workers");
        // No receivers left just means every worker already exited
        let _ = self.shutdown_tx.send(());

        // Phase 2: Wait for workers
        tracing::info!("Phase 2: Waiting for consumer workers");
        result.workers_stopped = workers.join(self.config.worker_timeout).await;

        // Phase 3: Close queue
        tracing::info!("Phase 3: Closing dispatch queue");
        self.queue.close().await;
        match self.queue.stats().await {
            Ok(stats) => {
                result.left_in_queue = stats.ready + stats.in_flight;
                if result.left_in_queue > 0 {
                    tracing::warn!(
                        backend = %stats.backend,
                        ready = stats.ready,
                        in_flight = stats.in_flight,
                        "Payloads left unprocessed at shutdown"
                    );
                }
            }
            Err(e) => tracing::warn!(error = %e, "Could not read final queue stats"),
        }

        // Phase 4: Close database pool
        if let Some(pool) = &self.postgres_pool {
            tracing::info!("Phase 4: Closing PostgreSQL pool");
            pool.close().await;
        }

        result.duration = start.elapsed();
        result.success = result.workers_stopped == result.workers_total;

        tracing::info!(
            workers_stopped = result.workers_stopped,
            workers_total = result.workers_total,
            left_in_queue = result.left_in_queue,
            duration_ms = result.duration.as_millis(),
            "Graceful shutdown completed"
        );

        result
    }
}

/// Result of a graceful shutdown operation
#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Whether every worker stopped within the timeout
    pub success: bool,
    pub workers_total: usize,
    pub workers_stopped: usize,
    /// Ready plus in-flight payloads after the queue was closed
    pub left_in_queue: usize,
    /// Total time taken for shutdown
    pub duration: Duration,
}
