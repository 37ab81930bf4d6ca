//! Process-level metrics describing the exporter's own probe activity.

use std::sync::Arc;
use std::time::Duration;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// Prefix for every exporter self-metric.
const METRIC_PREFIX: &str = "json_exporter";

/// Final state of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success,
    MissingTarget,
    FetchError,
    WalkError,
    EncodeError,
}

impl ProbeOutcome {
    /// Label value for this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Success => "success",
            ProbeOutcome::MissingTarget => "missing_target",
            ProbeOutcome::FetchError => "fetch_error",
            ProbeOutcome::WalkError => "walk_error",
            ProbeOutcome::EncodeError => "encode_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
struct OutcomeLabels {
    outcome: String,
}

impl From<ProbeOutcome> for OutcomeLabels {
    fn from(outcome: ProbeOutcome) -> Self {
        Self {
            outcome: outcome.as_str().to_string(),
        }
    }
}

/// Exporter self-metrics, registered once at startup.
///
/// All metrics are atomic, so a shared reference is enough to record and
/// encode concurrently.
#[derive(Debug)]
pub struct ExporterMetrics {
    registry: Registry,
    probes: Family<OutcomeLabels, Counter>,
    probe_duration: Histogram,
    samples: Counter,
    keys_filtered: Counter,
}

/// Create a shareable metrics handle.
pub type SharedMetrics = Arc<ExporterMetrics>;

impl ExporterMetrics {
    /// Create and register all exporter metrics.
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix(METRIC_PREFIX);

        let probes = Family::<OutcomeLabels, Counter>::default();
        registry.register("probes", "Probes handled, by outcome", probes.clone());

        // 5ms .. ~10s
        let probe_duration = Histogram::new(exponential_buckets(0.005, 2.0, 12));
        registry.register(
            "probe_duration_seconds",
            "Time spent handling a probe, including the target fetch",
            probe_duration.clone(),
        );

        let samples = Counter::default();
        registry.register(
            "probe_samples",
            "Numeric values extracted from probed documents",
            samples.clone(),
        );

        let keys_filtered = Counter::default();
        registry.register(
            "probe_keys_filtered",
            "Flattened keys dropped by the key filter",
            keys_filtered.clone(),
        );

        Self {
            registry,
            probes,
            probe_duration,
            samples,
            keys_filtered,
        }
    }

    /// Record a completed probe.
    pub fn record_probe(&self, outcome: ProbeOutcome, elapsed: Duration) {
        self.probes.get_or_create(&outcome.into()).inc();
        self.probe_duration.observe(elapsed.as_secs_f64());
    }

    /// Add to the extracted sample count.
    pub fn add_samples(&self, count: u64) {
        self.samples.inc_by(count);
    }

    /// Add to the filtered key count.
    pub fn add_filtered(&self, count: u64) {
        self.keys_filtered.inc_by(count);
    }

    /// Number of probes recorded with `outcome`.
    pub fn probe_count(&self, outcome: ProbeOutcome) -> u64 {
        self.probes.get_or_create(&outcome.into()).get()
    }

    /// Total samples extracted so far.
    pub fn sample_count(&self) -> u64 {
        self.samples.get()
    }

    /// Encode all exporter metrics in the OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut body = String::new();
        encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}
