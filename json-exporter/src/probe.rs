//! Probe orchestration: fetch, flatten, register, encode.
//!
//! Each probe builds its own [`ProbeRegistry`]; nothing derived from one
//! target document outlives the request that fetched it.

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::ExporterConfig;
use crate::fetch::{FetchError, Fetcher};
use crate::flatten::{Flattener, WalkError};
use crate::mapping::KeyFilter;
use crate::metrics::{ProbeOutcome, SharedMetrics};
use crate::registry::{GaugeSink, ProbeRegistry, RegistryError};

/// Query parameters accepted by the probe endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeParams {
    /// URL of the JSON document to probe.
    pub target: Option<String>,
    /// String prepended verbatim to every metric name.
    pub prefix: Option<String>,
}

/// Errors that fail a probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Target parameter is missing")]
    MissingTarget,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Walk(#[from] WalkError<RegistryError>),
    #[error("Failed to encode metrics: {0}")]
    Encode(#[from] std::fmt::Error),
}

impl ProbeError {
    /// Outcome recorded in the exporter's own metrics.
    pub fn outcome(&self) -> ProbeOutcome {
        match self {
            ProbeError::MissingTarget => ProbeOutcome::MissingTarget,
            ProbeError::Fetch(_) => ProbeOutcome::FetchError,
            ProbeError::Walk(_) => ProbeOutcome::WalkError,
            ProbeError::Encode(_) => ProbeOutcome::EncodeError,
        }
    }

    /// HTTP status reported to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            ProbeError::MissingTarget => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProbeError {
    fn into_response(self) -> Response {
        (self.status(), format!("{}\n", self)).into_response()
    }
}

/// Runs probes against remote targets.
pub struct Prober {
    fetcher: Arc<dyn Fetcher>,
    flattener: Flattener,
    filter: KeyFilter,
    sanitize_names: bool,
    metrics: SharedMetrics,
}

impl Prober {
    /// Create a prober using the shared `fetcher`.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        config: &ExporterConfig,
        metrics: SharedMetrics,
    ) -> Self {
        let flattener = Flattener::new(config.probe.max_depth);
        let filter = KeyFilter::new(&config.filters);

        info!(
            max_depth = flattener.max_depth(),
            filtering = !filter.is_empty(),
            sanitize_names = config.probe.sanitize_names,
            "Prober configured"
        );

        Self {
            fetcher,
            flattener,
            filter,
            sanitize_names: config.probe.sanitize_names,
            metrics,
        }
    }

    /// Probe one target and return the encoded gauges.
    pub async fn probe(&self, params: &ProbeParams) -> Result<String, ProbeError> {
        let start = Instant::now();
        let result = self.run(params).await;

        let outcome = match &result {
            Ok(_) => ProbeOutcome::Success,
            Err(e) => e.outcome(),
        };
        self.metrics.record_probe(outcome, start.elapsed());

        if let Err(e) = &result {
            match e {
                ProbeError::MissingTarget => debug!("Probe rejected: {}", e),
                _ => error!(
                    target_url = params.target.as_deref().unwrap_or_default(),
                    error = %e,
                    "Probe failed"
                ),
            }
        }

        result
    }

    async fn run(&self, params: &ProbeParams) -> Result<String, ProbeError> {
        let target = params
            .target
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ProbeError::MissingTarget)?;
        let prefix = params.prefix.as_deref().unwrap_or_default();

        let document = self.fetcher.fetch(target).await?;

        let mut registry = ProbeRegistry::new();
        let mut sink = GaugeSink::new(&mut registry, prefix, &self.filter, self.sanitize_names);
        let emitted = self.flattener.walk("", &document, &mut sink)?;
        let filtered = sink.filtered();

        self.metrics.add_samples(emitted as u64);
        self.metrics.add_filtered(filtered);

        debug!(
            target_url = %target,
            emitted,
            filtered,
            gauges = registry.len(),
            "Probe completed"
        );

        Ok(registry.encode()?)
    }
}
