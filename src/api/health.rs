//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub queue: QueueHealthResponse,
    pub store: StoreHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct QueueHealthResponse {
    pub backend: String,
    pub ready: usize,
    pub in_flight: usize,
    pub dead_lettered: usize,
    pub closed: bool,
}

#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    pub backend: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = state.start_time.elapsed().as_secs();
    let closed = state.queue.is_closed();

    let (queue, queue_reachable) = match state.queue.stats().await {
        Ok(stats) => (
            QueueHealthResponse {
                backend: stats.backend,
                ready: stats.ready,
                in_flight: stats.in_flight,
                dead_lettered: stats.dead_lettered,
                closed,
            },
            true,
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Queue stats unavailable");
            (
                QueueHealthResponse {
                    backend: state.queue.backend_name().to_string(),
                    ready: 0,
                    in_flight: 0,
                    dead_lettered: 0,
                    closed,
                },
                false,
            )
        }
    };

    let status = if queue_reachable && !closed {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        queue,
        store: StoreHealthResponse {
            backend: state.store.backend_name().to_string(),
        },
    })
}
