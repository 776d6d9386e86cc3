use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Gauge, HistogramVec, IntCounter, register_counter_vec, register_gauge,
    register_histogram_vec, register_int_counter,
};

lazy_static! {
    // Admission metrics
    pub static ref ADMISSIONS_TOTAL: CounterVec = register_counter_vec!(
        "admission_requests_total",
        "Total number of admission checks",
        &["class", "allowed"]
    ).unwrap();

    pub static ref ADMISSIONS_DENIED_TOTAL: CounterVec = register_counter_vec!(
        "admission_requests_denied_total",
        "Total number of denied requests",
        &["class"]
    ).unwrap();

    pub static ref ADMISSIONS_EXEMPT_TOTAL: IntCounter = register_int_counter!(
        "admission_requests_exempt_total",
        "Total number of requests outside any traffic class"
    ).unwrap();

    // Latency metrics
    pub static ref CHECK_DURATION: HistogramVec = register_histogram_vec!(
        "admission_check_duration_seconds",
        "Admission check duration in seconds",
        &["class"],
        vec![0.000001, 0.000005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005]
    ).unwrap();

    // Registry metrics
    pub static ref TRACKED_BUCKETS: Gauge = register_gauge!(
        "admission_tracked_buckets",
        "Number of live token buckets in the registry"
    ).unwrap();

    pub static ref SWEPT_BUCKETS_TOTAL: IntCounter = register_int_counter!(
        "admission_swept_buckets_total",
        "Total number of idle buckets evicted by the sweeper"
    ).unwrap();

    // Config metrics
    pub static ref CONFIG_RELOADS_TOTAL: CounterVec = register_counter_vec!(
        "admission_config_reloads_total",
        "Total number of configuration reloads",
        &["result"]
    ).unwrap();
}

/// Record an admission check outcome
pub fn record_admission(class: &str, allowed: bool, duration_secs: f64) {
    let allowed_str = if allowed { "true" } else { "false" };
    ADMISSIONS_TOTAL
        .with_label_values(&[class, allowed_str])
        .inc();

    CHECK_DURATION
        .with_label_values(&[class])
        .observe(duration_secs);
}

/// Record a denied request
pub fn record_denied(class: &str) {
    ADMISSIONS_DENIED_TOTAL.with_label_values(&[class]).inc();
}

/// Record a request outside any traffic class
pub fn record_exempt() {
    ADMISSIONS_EXEMPT_TOTAL.inc();
}

/// Update the live bucket gauge
pub fn update_tracked_buckets(count: usize) {
    TRACKED_BUCKETS.set(count as f64);
}

/// Record buckets evicted by one sweep pass
pub fn record_swept(count: usize) {
    SWEPT_BUCKETS_TOTAL.inc_by(count as u64);
}

/// Record config reload
pub fn record_config_reload(success: bool) {
    let result = if success { "success" } else { "error" };
    CONFIG_RELOADS_TOTAL.with_label_values(&[result]).inc();
}
