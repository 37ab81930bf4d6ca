//! Request-scoped gauge registry for probe results.
//!
//! A [`ProbeRegistry`] is created for a single scrape, filled from one
//! flattened document and encoded once. It is never shared between requests.

use std::collections::HashSet;
use std::sync::atomic::AtomicU64;

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use thiserror::Error;
use tracing::trace;

use crate::flatten::Sink;
use crate::mapping::{KeyFilter, build_metric_name};

/// Help text attached to every probed gauge.
const GAUGE_HELP: &str = "Retrieved value";

/// Registration errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate metric name '{0}'")]
    Duplicate(String),
    #[error("empty metric name for value {0}")]
    EmptyName(f64),
}

/// Gauges materialized from one probed document.
#[derive(Debug, Default)]
pub struct ProbeRegistry {
    registry: Registry,
    names: HashSet<String>,
}

impl ProbeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gauge named `name` holding `value`.
    ///
    /// Names are unique within a registry; registering the same name twice
    /// is an error and leaves the first gauge untouched. An empty name is
    /// rejected since it cannot be exposed.
    pub fn register_gauge(&mut self, name: &str, value: f64) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName(value));
        }
        if !self.names.insert(name.to_string()) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        let gauge = Gauge::<f64, AtomicU64>::default();
        gauge.set(value);
        self.registry.register(name, GAUGE_HELP, gauge);
        Ok(())
    }

    /// Number of registered gauges.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no gauge has been registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[cfg(test)]
    fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Encode all gauges in the OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut body = String::with_capacity(self.names.len() * 64);
        encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

/// Sink that turns flattened samples into gauges.
///
/// Keys rejected by the filter are counted and dropped. Accepted keys are
/// named `prefix + key`, optionally sanitized.
#[derive(Debug)]
pub struct GaugeSink<'a> {
    registry: &'a mut ProbeRegistry,
    prefix: &'a str,
    filter: &'a KeyFilter,
    sanitize: bool,
    filtered: u64,
}

impl<'a> GaugeSink<'a> {
    pub fn new(
        registry: &'a mut ProbeRegistry,
        prefix: &'a str,
        filter: &'a KeyFilter,
        sanitize: bool,
    ) -> Self {
        Self {
            registry,
            prefix,
            filter,
            sanitize,
            filtered: 0,
        }
    }

    /// Number of keys dropped by the filter so far.
    pub fn filtered(&self) -> u64 {
        self.filtered
    }
}

impl Sink for GaugeSink<'_> {
    type Error = RegistryError;

    fn receive(&mut self, key: &str, value: f64) -> Result<(), Self::Error> {
        if !self.filter.should_include(key) {
            self.filtered += 1;
            trace!(key, "Key filtered out");
            return Ok(());
        }

        let name = build_metric_name(self.prefix, key, self.sanitize);
        self.registry.register_gauge(&name, value)
    }
}
