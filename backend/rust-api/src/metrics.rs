use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Business metrics
    pub static ref POOLS_COMPUTED_TOTAL: IntCounter = register_int_counter!(
        "pools_computed_total",
        "Total number of eligible-pool computations"
    )
    .unwrap();

    pub static ref ATTEMPTS_ASSEMBLED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "attempts_assembled_total",
        "Total number of assembled test attempts",
        &["mode"]
    )
    .unwrap();

    pub static ref ATTEMPTS_ACTIVE: IntGauge = register_int_gauge!(
        "attempts_active",
        "Number of attempts not yet finalized"
    )
    .unwrap();

    pub static ref ATTEMPT_MUTATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "attempt_mutations_total",
        "Total number of attempt state mutations",
        &["kind"]
    )
    .unwrap();
}

pub fn render_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
