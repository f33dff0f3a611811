use ::metrics::{register_counter, register_histogram, Counter, Histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Capture counters and timings
///
/// Handles are registered against whatever recorder is installed when
/// [`Metrics::new`] runs; without one they are no-ops.
#[derive(Clone)]
pub struct Metrics {
    pub captures_succeeded: Counter,
    pub captures_failed: Counter,
    pub capture_duration: Histogram,
    pub cache_hits: Counter,
    pub cache_misses: Counter,
    pub timeout_errors: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            captures_succeeded: register_counter!("screenshotter_captures_total", "outcome" => "success"),
            captures_failed: register_counter!("screenshotter_captures_total", "outcome" => "failure"),
            capture_duration: register_histogram!("screenshotter_capture_duration_seconds"),
            cache_hits: register_counter!("screenshotter_cache_lookups_total", "result" => "hit"),
            cache_misses: register_counter!("screenshotter_cache_lookups_total", "result" => "miss"),
            timeout_errors: register_counter!("screenshotter_timeouts_total"),
        }
    }

    pub fn record_capture(&self, duration: Duration, success: bool) {
        if success {
            self.captures_succeeded.increment(1);
        } else {
            self.captures_failed.increment(1);
        }

        self.capture_duration.record(duration.as_secs_f64());
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        if hit {
            self.cache_hits.increment(1);
        } else {
            self.cache_misses.increment(1);
        }
    }

    pub fn record_timeout(&self) {
        self.timeout_errors.increment(1);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

/// Installs the global Prometheus recorder. Call before building a
/// [`Screenshotter`](crate::Screenshotter) so its handles are live.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}
