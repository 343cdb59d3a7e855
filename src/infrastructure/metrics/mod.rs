//! Prometheus metrics for the message service.
//!
//! - Dispatch metrics (payloads enqueued, requests rejected)
//! - Consumer metrics (delivery outcomes, processing latency)
//! - Queue depth gauges (refreshed on scrape)
//! - Store query counts

mod helpers;

pub use helpers::{encode_metrics, ConsumerMetrics, DispatchMetrics, QueueMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "ara";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Payloads accepted onto the dispatch queue
    pub static ref DISPATCH_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_dispatch_enqueued_total", METRIC_PREFIX),
        "Total payloads enqueued for dispatch"
    ).unwrap();

    /// Submissions rejected before reaching the queue
    pub static ref DISPATCH_REJECTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_dispatch_rejected_total", METRIC_PREFIX),
        "Total submissions rejected by validation"
    ).unwrap();

    // ============================================================================
    // Consumer Metrics
    // ============================================================================

    /// Delivery outcomes: persisted, duplicate, redelivered, dead_lettered
    pub static ref CONSUMER_DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_consumer_deliveries_total", METRIC_PREFIX),
        "Total deliveries handled by consumers, by outcome",
        &["outcome"]
    ).unwrap();

    /// Time spent handling one delivery
    pub static ref CONSUMER_PROCESSING_SECONDS: Histogram = register_histogram!(
        format!("{}_consumer_processing_seconds", METRIC_PREFIX),
        "Delivery processing latency in seconds",
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).unwrap();

    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Payloads waiting for a consumer
    pub static ref QUEUE_READY: IntGauge = register_int_gauge!(
        format!("{}_queue_ready", METRIC_PREFIX),
        "Payloads waiting in the dispatch queue"
    ).unwrap();

    /// Payloads held by consumers and not yet acknowledged
    pub static ref QUEUE_IN_FLIGHT: IntGauge = register_int_gauge!(
        format!("{}_queue_in_flight", METRIC_PREFIX),
        "Payloads delivered but not yet acknowledged"
    ).unwrap();

    /// Payloads parked in the dead-letter list
    pub static ref QUEUE_DEAD_LETTERED: IntGauge = register_int_gauge!(
        format!("{}_queue_dead_lettered", METRIC_PREFIX),
        "Payloads in the dead-letter list"
    ).unwrap();

    // ============================================================================
    // Store Metrics
    // ============================================================================

    /// Listing queries served
    pub static ref STORE_QUERIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_store_queries_total", METRIC_PREFIX),
        "Total message listing queries"
    ).unwrap();
}
