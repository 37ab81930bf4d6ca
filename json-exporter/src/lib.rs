//! Probe-based Prometheus exporter for JSON endpoints.
//!
//! On every scrape of `/probe?target=<url>` the exporter fetches the JSON
//! document at `target`, flattens it into numeric key/value pairs and returns
//! them as gauges in the OpenMetrics text format.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   JSON target   │────>│     Prober      │────>│   HTTP Server   │
//! │  (any URL)      │     │ (fetch/flatten) │     │    (/probe)     │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Keys join object members with `.` and array indices with `__`:
//! `{"a": {"c": [10]}}` becomes the gauge `a.c__0 10`.
//!
//! # Usage
//!
//! ```bash
//! json-exporter --listen-address 0.0.0.0:9116
//! curl 'http://localhost:9116/probe?target=https://service.local/stats&prefix=svc_'
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod fetch;
pub mod flatten;
pub mod http;
pub mod mapping;
pub mod metrics;
pub mod probe;
pub mod registry;

pub use config::ExporterConfig;
pub use fetch::{Fetcher, HttpFetcher};
pub use flatten::{Flattener, Sink};
pub use http::HttpServer;
pub use metrics::{ExporterMetrics, SharedMetrics};
pub use probe::Prober;
pub use registry::ProbeRegistry;
