//! Prometheus metrics exposition
//!
//! The library crates record through the `metrics` facade; this module
//! installs the recorder that `/metrics` renders:
//!
//! - `drive_api_requests_total` (counter): labels `operation`, `outcome`
//! - `drive_api_request_duration_seconds` (histogram): label `operation`
//! - `drive_poll_ticks_total` (counter): label `outcome`
//! - `drive_poll_objects_total` (counter)
//! - `drive_account_rotations_total` (counter)
//! - `drive_token_refreshes_total` (counter): label `outcome`

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Request latency buckets, 10ms to the 60s default request timeout.
const DURATION_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

fn builder() -> anyhow::Result<PrometheusBuilder> {
    Ok(PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("drive_api_request_duration_seconds".to_string()),
        DURATION_BUCKETS,
    )?)
}

/// Install the global recorder and return the handle `/metrics` renders.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    Ok(builder()?.install_recorder()?)
}

#[cfg(test)]
pub fn test_handle() -> PrometheusHandle {
    builder()
        .expect("valid buckets")
        .build_recorder()
        .handle()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_latency_renders_as_histogram() {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        metrics::histogram!("drive_api_request_duration_seconds", "operation" => "list")
            .record(0.042);
        metrics::counter!("drive_api_requests_total", "operation" => "list", "outcome" => "ok")
            .increment(1);

        let output = handle.render();
        assert!(output.contains("drive_api_request_duration_seconds_bucket"));
        assert!(output.contains("le=\"0.05\""));
        assert!(output.contains("le=\"60\""));
        assert!(output.contains("drive_api_requests_total{operation=\"list\",outcome=\"ok\"} 1"));
    }

    #[test]
    fn rotation_counter_renders() {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        metrics::counter!("drive_account_rotations_total").increment(2);

        assert!(handle.render().contains("drive_account_rotations_total 2"));
    }
}
