use axum::http::{Method, StatusCode};
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder,
};

// Prometheus metrics (default registry)
pub static ITEM_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "items_requests_total",
        "Item requests handled, by method and status",
        &["method", "status"]
    )
    .expect("register items_requests_total")
});

pub static ITEM_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "items_request_duration_seconds",
        "Item request duration in seconds",
        &["method"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("register items_request_duration_seconds")
});

/// Label value for a request verb. Anything outside the item verbs shares
/// `OTHER` so clients cannot mint new series.
pub fn method_label(method: &Method) -> &'static str {
    if method == Method::GET {
        "GET"
    } else if method == Method::POST {
        "POST"
    } else if method == Method::PUT {
        "PUT"
    } else if method == Method::DELETE {
        "DELETE"
    } else {
        "OTHER"
    }
}

pub fn record(method: &Method, status: StatusCode, elapsed_secs: f64) {
    let method = method_label(method);
    ITEM_REQUESTS_TOTAL
        .with_label_values(&[method, status.as_str()])
        .inc();
    ITEM_REQUEST_DURATION
        .with_label_values(&[method])
        .observe(elapsed_secs);
}

pub fn encode_metrics() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (StatusCode::OK, String::from_utf8(buffer).unwrap_or_default())
}
