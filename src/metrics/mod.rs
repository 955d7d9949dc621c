//! Metrics module
//!
//! Prometheus counters for uploads, source fetch paths and relay fallbacks,
//! registered in the default registry.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec, TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "r2_uploads_total",
        "Total number of uploads",
        &["bucket", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "r2_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "r2_upload_duration_seconds",
        "Upload duration in seconds, source fetch included",
        &["bucket"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    // Source metrics
    pub static ref SOURCE_FETCHES: CounterVec = register_counter_vec!(
        "r2_source_fetches_total",
        "Source image fetches by path",
        &["path", "status"]  // path: "direct", "relay" or "direct_fallback"
    ).unwrap();

    pub static ref RELAY_FALLBACKS: CounterVec = register_counter_vec!(
        "r2_relay_fallbacks_total",
        "Relay fetches that fell back to a direct fetch",
        &["reason"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "r2_errors_total",
        "Total upload errors",
        &["kind"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(bucket: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure(bucket: &str) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "failure"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(bucket: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[bucket])
        .observe(duration_secs);
}

/// Record a source fetch by path
pub fn record_source_fetch(path: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    SOURCE_FETCHES.with_label_values(&[path, status]).inc();
}

/// Record a relay fallback
pub fn record_relay_fallback(reason: &str) {
    RELAY_FALLBACKS.with_label_values(&[reason]).inc();
}

/// Record an error
pub fn record_error(kind: &str) {
    ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

/// Render the default registry in the Prometheus text format
pub fn gather_text() -> String {
    TextEncoder::new()
        .encode_to_string(&prometheus::gather())
        .unwrap_or_default()
}
