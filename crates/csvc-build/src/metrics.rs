//! Build metrics
//!
//! The orchestrator reports through the [`MetricsRecorder`] trait. The
//! handle is built once at startup and passed in; there is no process-wide
//! registry. [`BuildMetrics`] is the backend served by the exporter: a
//! private `prometheus` registry holding the outcome counter and the
//! duration histogram, safe to update from concurrent builds.

use std::time::Duration;

use csvc_core::BuildOutcome;
use prometheus::core::Collector;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

/// Counter metric name
pub const BUILDS_TOTAL: &str = "docker_image_builds_total";

/// Histogram metric name
pub const BUILD_DURATION_SECONDS: &str = "docker_image_build_duration_seconds";

/// Sink for build observability signals.
///
/// Implementations must not panic; nothing about a build depends on them.
pub trait MetricsRecorder: Send + Sync {
    /// Count one outcome transition
    fn record(&self, outcome: BuildOutcome);

    /// Observe the duration of one whole build call
    fn observe_duration(&self, duration: Duration);
}

/// Recorder that drops everything, used when metrics are disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn record(&self, _outcome: BuildOutcome) {}

    fn observe_duration(&self, _duration: Duration) {}
}

/// Outcome counter and duration histogram in their own registry
#[derive(Clone)]
pub struct BuildMetrics {
    registry: Registry,
    builds: IntCounterVec,
    duration: Histogram,
}

/// Point-in-time copy of [`BuildMetrics`]
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    /// Builds started
    pub started: u64,
    /// Builds that succeeded
    pub success: u64,
    /// Builds that failed
    pub failure: u64,
    /// Duration samples recorded
    pub duration_count: u64,
    /// Sum of all samples in seconds
    pub duration_sum_secs: f64,
    /// Cumulative `(upper bound, count)` pairs, `+Inf` last
    pub buckets: Vec<(f64, u64)>,
}

impl BuildMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let builds = IntCounterVec::new(
            Opts::new(BUILDS_TOTAL, "Total number of Docker image builds attempted"),
            &["status"],
        )?;
        let duration = Histogram::with_opts(
            HistogramOpts::new(BUILD_DURATION_SECONDS, "Duration of Docker image builds in seconds")
                .buckets(prometheus::DEFAULT_BUCKETS.to_vec()),
        )?;

        let registry = Registry::new();
        registry.register(Box::new(builds.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        // Every label is exported from the start, at zero
        for outcome in BuildOutcome::ALL {
            builds.with_label_values(&[outcome.as_str()]);
        }

        Ok(Self { registry, builds, duration })
    }

    /// Read one outcome counter
    pub fn count(&self, outcome: BuildOutcome) -> u64 {
        self.builds.with_label_values(&[outcome.as_str()]).get()
    }

    /// Copy the current values
    pub fn snapshot(&self) -> MetricsSnapshot {
        let duration_count = self.duration.get_sample_count();

        let mut buckets: Vec<(f64, u64)> = self
            .duration
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .flat_map(|metric| metric.get_histogram().get_bucket())
            .map(|bucket| (bucket.get_upper_bound(), bucket.get_cumulative_count()))
            .collect();
        buckets.push((f64::INFINITY, duration_count));

        MetricsSnapshot {
            started: self.count(BuildOutcome::Started),
            success: self.count(BuildOutcome::Success),
            failure: self.count(BuildOutcome::Failure),
            duration_count,
            duration_sum_secs: self.duration.get_sample_sum(),
            buckets,
        }
    }

    /// Content type of [`Self::render_prometheus`]
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Render in the Prometheus text exposition format
    pub fn render_prometheus(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl MetricsRecorder for BuildMetrics {
    fn record(&self, outcome: BuildOutcome) {
        self.builds.with_label_values(&[outcome.as_str()]).inc();
        tracing::trace!(metric = BUILDS_TOTAL, status = outcome.as_str(), "counter incremented");
    }

    fn observe_duration(&self, duration: Duration) {
        let secs = duration.as_secs_f64();
        self.duration.observe(secs);
        tracing::trace!(metric = BUILD_DURATION_SECONDS, seconds = secs, "duration observed");
    }
}
