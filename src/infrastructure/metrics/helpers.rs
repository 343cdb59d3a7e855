//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::queue::QueueStats;

use super::{
    CONSUMER_DELIVERIES_TOTAL, CONSUMER_PROCESSING_SECONDS, DISPATCH_ENQUEUED_TOTAL,
    DISPATCH_REJECTED_TOTAL, QUEUE_DEAD_LETTERED, QUEUE_IN_FLIGHT, QUEUE_READY,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

pub struct DispatchMetrics;

impl DispatchMetrics {
    pub fn record_enqueued() {
        DISPATCH_ENQUEUED_TOTAL.inc();
    }

    pub fn record_rejected() {
        DISPATCH_REJECTED_TOTAL.inc();
    }
}

pub struct ConsumerMetrics;

impl ConsumerMetrics {
    pub fn record_persisted() {
        CONSUMER_DELIVERIES_TOTAL.with_label_values(&["persisted"]).inc();
    }

    pub fn record_duplicate() {
        CONSUMER_DELIVERIES_TOTAL.with_label_values(&["duplicate"]).inc();
    }

    pub fn record_redelivered() {
        CONSUMER_DELIVERIES_TOTAL.with_label_values(&["redelivered"]).inc();
    }

    pub fn record_dead_lettered() {
        CONSUMER_DELIVERIES_TOTAL.with_label_values(&["dead_lettered"]).inc();
    }

    pub fn observe_processing(seconds: f64) {
        CONSUMER_PROCESSING_SECONDS.observe(seconds);
    }
}

pub struct QueueMetrics;

impl QueueMetrics {
    /// Copy a depth snapshot into the gauges.
    pub fn update(stats: &QueueStats) {
        QUEUE_READY.set(stats.ready as i64);
        QUEUE_IN_FLIGHT.set(stats.in_flight as i64);
        QUEUE_DEAD_LETTERED.set(stats.dead_lettered as i64);
    }
}
