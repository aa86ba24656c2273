use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Remote calls (fetch / submit / cheat-event)
    pub static ref REMOTE_CALLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "interview_remote_calls_total",
        "Total number of calls to the interview backend",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref REMOTE_CALL_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "interview_remote_call_duration_seconds",
        "Interview backend call duration in seconds",
        &["operation"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Start-time storage
    pub static ref START_TIME_STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "interview_start_time_store_operations_total",
        "Total number of start-time store reads",
        &["backend", "status"]
    )
    .unwrap();

    // Session lifecycle
    pub static ref SESSION_LOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "interview_session_loads_total",
        "Total number of interview session loads",
        &["outcome"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "interview_sessions_active",
        "Number of currently active interview sessions"
    )
    .unwrap();

    pub static ref SESSIONS_FINISHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "interview_sessions_finished_total",
        "Total number of interview sessions handed over to the report view",
        &["trigger"]
    )
    .unwrap();

    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "interview_submissions_total",
        "Total number of answer submissions",
        &["trigger", "status"]
    )
    .unwrap();

    // Anticheat
    pub static ref ANTICHEAT_VIOLATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "interview_anticheat_violations_total",
        "Total number of integrity violations detected",
        &["violation_type"]
    )
    .unwrap();

    pub static ref VIOLATION_REPORTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "interview_violation_reports_total",
        "Total number of violation reports sent to the backend",
        &["status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track a backend call with metrics
pub async fn track_remote_call<F, T, E>(operation: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    REMOTE_CALLS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    REMOTE_CALL_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}

/// Helper: track a start-time store access
pub async fn track_store_operation<F, T>(backend: &str, future: F) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let result = future.await;
    let status = if result.is_ok() { "success" } else { "error" };

    START_TIME_STORE_OPERATIONS_TOTAL
        .with_label_values(&[backend, status])
        .inc();

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = SUBMISSIONS_TOTAL
            .with_label_values(&["manual", "success"])
            .get();
        let _ = SESSIONS_ACTIVE.get();
    }

    #[tokio::test]
    async fn test_track_remote_call_records_status() {
        let before = REMOTE_CALLS_TOTAL
            .with_label_values(&["metrics_test", "error"])
            .get();

        let result: Result<(), &str> = track_remote_call("metrics_test", async { Err("boom") }).await;
        assert!(result.is_err());

        let after = REMOTE_CALLS_TOTAL
            .with_label_values(&["metrics_test", "error"])
            .get();
        assert_eq!(after, before + 1);
    }

    #[test]
    fn test_render_metrics() {
        ANTICHEAT_VIOLATIONS_TOTAL
            .with_label_values(&["tab_hidden"])
            .inc();

        let output = render_metrics().unwrap();
        assert!(output.contains("interview_anticheat_violations_total"));
    }
}
