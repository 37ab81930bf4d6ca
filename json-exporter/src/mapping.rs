//! Mapping from flattened JSON keys to Prometheus metric names.

use crate::config::FilterConfig;

/// Sanitize a metric name to be Prometheus-compatible.
///
/// Prometheus metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
/// This function:
/// - Replaces every invalid character with an underscore
/// - Prefixes a leading digit with an underscore
///
/// Runs of underscores are kept as-is so the `__` array index separator
/// remains distinguishable from a replaced `.`.
pub fn sanitize_metric_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 1);

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        result.push('_');
    }

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
            result.push(c);
        } else {
            result.push('_');
        }
    }

    if result.is_empty() {
        result.push_str("unnamed");
    }

    result
}

/// Build the exposed metric name for a flattened key.
///
/// The prefix is prepended verbatim; sanitization, when enabled, applies to
/// the combined name.
pub fn build_metric_name(prefix: &str, key: &str, sanitize: bool) -> String {
    let name = format!("{}{}", prefix, key);
    if sanitize {
        sanitize_metric_name(&name)
    } else {
        name
    }
}

/// Include/exclude filter for flattened keys.
#[derive(Debug, Clone, Default)]
pub struct KeyFilter {
    include_keys: Vec<glob::Pattern>,
    exclude_keys: Vec<glob::Pattern>,
}

impl KeyFilter {
    /// Create a new filter from configuration.
    ///
    /// Patterns that fail to compile are skipped; configuration validation
    /// rejects them before this point.
    pub fn new(config: &FilterConfig) -> Self {
        let include_keys = config
            .include_keys
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect();

        let exclude_keys = config
            .exclude_keys
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect();

        Self {
            include_keys,
            exclude_keys,
        }
    }

    /// Check if a flattened key should be exported.
    pub fn should_include(&self, key: &str) -> bool {
        if !self.include_keys.is_empty() && !self.include_keys.iter().any(|p| p.matches(key)) {
            return false;
        }

        !self.exclude_keys.iter().any(|p| p.matches(key))
    }

    /// Whether any pattern is configured.
    pub fn is_empty(&self) -> bool {
        self.include_keys.is_empty() && self.exclude_keys.is_empty()
    }
}
