use prometheus::{
    core::Collector, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use std::sync::{Once, OnceLock};

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static AUDIT_WRITE_FAILURES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static LEGACY_PASSWORD_VERIFICATIONS_TOTAL: OnceLock<IntCounter> = OnceLock::new();
pub static ACCESS_DENIED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn register<C: Collector + Clone + 'static>(registry: &Registry, name: &str, metric: C) -> C {
    if let Err(e) = registry.register(Box::new(metric.clone())) {
        tracing::error!("Failed to register {} collector: {}", name, e);
        panic!("Failed to initialize metrics: {}", e);
    }
    metric
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    match IntCounterVec::new(Opts::new(name, help), labels) {
        Ok(metric) => metric,
        Err(e) => {
            tracing::error!("Failed to create {} metric: {}", name, e);
            panic!("Failed to initialize metrics: {}", e);
        }
    }
}

static INIT: Once = Once::new();

/// Build the registry. Later calls are no-ops.
pub fn init_metrics() {
    INIT.call_once(build_metrics);
}

fn build_metrics() {
    let registry = Registry::new();

    let requests_total = register(
        &registry,
        "http_requests_total",
        counter_vec(
            "http_requests_total",
            "Total number of HTTP requests",
            &["method", "path", "status"],
        ),
    );

    let request_duration = match HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    ) {
        Ok(metric) => register(&registry, "http_request_duration_seconds", metric),
        Err(e) => {
            tracing::error!(
                "Failed to create http_request_duration_seconds metric: {}",
                e
            );
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    let audit_failures = register(
        &registry,
        "audit_write_failures_total",
        counter_vec(
            "audit_write_failures_total",
            "Audit entries that could not be persisted and went to the recovery log",
            &["reason"],
        ),
    );

    let legacy_verifications = match IntCounter::new(
        "legacy_password_verifications_total",
        "Logins verified against a legacy plaintext credential",
    ) {
        Ok(metric) => register(&registry, "legacy_password_verifications_total", metric),
        Err(e) => {
            tracing::error!(
                "Failed to create legacy_password_verifications_total metric: {}",
                e
            );
            panic!("Failed to initialize metrics: {}", e);
        }
    };

    let access_denied = register(
        &registry,
        "access_denied_total",
        counter_vec(
            "access_denied_total",
            "Requests denied by the access policy",
            &["action"],
        ),
    );

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = AUDIT_WRITE_FAILURES_TOTAL.set(audit_failures);
    let _ = LEGACY_PASSWORD_VERIFICATIONS_TOTAL.set(legacy_verifications);
    let _ = ACCESS_DENIED_TOTAL.set(access_denied);
}

pub fn inc_audit_write_failure(reason: &str) {
    if let Some(counter) = AUDIT_WRITE_FAILURES_TOTAL.get() {
        counter.with_label_values(&[reason]).inc();
    }
}

pub fn inc_legacy_password_verification() {
    if let Some(counter) = LEGACY_PASSWORD_VERIFICATIONS_TOTAL.get() {
        counter.inc();
    }
}

pub fn inc_access_denied(action: &str) {
    if let Some(counter) = ACCESS_DENIED_TOTAL.get() {
        counter.with_label_values(&[action]).inc();
    }
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}
