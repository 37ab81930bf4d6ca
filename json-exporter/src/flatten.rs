//! Flattening of JSON documents into numeric key/value pairs.
//!
//! Object members are joined with `.` and array elements with `__` followed
//! by the zero-based index:
//!
//! ```text
//! {"a": {"b": 1, "c": [10, 20]}}   =>   a.b 1, a.c__0 10, a.c__1 20
//! ```
//!
//! Strings and nulls produce nothing. Booleans become `1.0` / `0.0`.

use std::convert::Infallible;

use serde_json::{Number, Value};
use thiserror::Error;
use tracing::warn;

/// Separator appended before an object member name.
pub const MEMBER_SEPARATOR: &str = ".";

/// Separator appended before an array index.
pub const INDEX_SEPARATOR: &str = "__";

/// Receiver of flattened samples.
///
/// A sink may reject a sample, in which case the walk stops and the error is
/// returned to the caller as [`WalkError::Sink`].
pub trait Sink {
    /// Error produced when a sample is rejected.
    type Error;

    /// Accept one `(key, value)` pair.
    fn receive(&mut self, key: &str, value: f64) -> Result<(), Self::Error>;
}

impl<F> Sink for F
where
    F: FnMut(&str, f64),
{
    type Error = Infallible;

    fn receive(&mut self, key: &str, value: f64) -> Result<(), Self::Error> {
        self(key, value);
        Ok(())
    }
}

/// Errors that abort a walk.
#[derive(Debug, Error)]
pub enum WalkError<E> {
    #[error("document nesting exceeds maximum depth of {max_depth} at '{path}'")]
    DepthExceeded { max_depth: usize, path: String },
    #[error("sample rejected: {0}")]
    Sink(E),
}

/// Walks JSON values with a bounded nesting depth.
#[derive(Debug, Clone, Copy)]
pub struct Flattener {
    max_depth: usize,
}

impl Flattener {
    /// Create a flattener that rejects documents nested deeper than `max_depth`.
    ///
    /// The root value sits at depth 0; every enclosing array or object adds one.
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Maximum accepted nesting depth.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Flatten `value` rooted at `path` into `sink`.
    ///
    /// Samples are emitted in the same depth-first order a recursive walk
    /// would produce; array elements always follow array order. Returns the
    /// number of samples emitted.
    pub fn walk<S: Sink>(
        &self,
        path: &str,
        value: &Value,
        sink: &mut S,
    ) -> Result<usize, WalkError<S::Error>> {
        let mut emitted = 0;
        let mut stack: Vec<(String, &Value, usize)> = vec![(path.to_string(), value, 0)];

        while let Some((path, value, depth)) = stack.pop() {
            if depth > self.max_depth {
                return Err(WalkError::DepthExceeded {
                    max_depth: self.max_depth,
                    path,
                });
            }

            match value {
                Value::Bool(b) => {
                    sink.receive(&path, if *b { 1.0 } else { 0.0 })
                        .map_err(WalkError::Sink)?;
                    emitted += 1;
                }
                Value::Number(n) => match number_to_f64(n) {
                    Some(v) => {
                        sink.receive(&path, v).map_err(WalkError::Sink)?;
                        emitted += 1;
                    }
                    None => warn!(key = %path, value = %n, "Unrecognized JSON number, skipping"),
                },
                Value::String(_) | Value::Null => {}
                // Children are pushed in reverse so the first one is popped first.
                Value::Array(items) => {
                    for (i, item) in items.iter().enumerate().rev() {
                        stack.push((format!("{path}{INDEX_SEPARATOR}{i}"), item, depth + 1));
                    }
                }
                Value::Object(members) => {
                    for (name, member) in members.iter().rev() {
                        stack.push((member_path(&path, name), member, depth + 1));
                    }
                }
            }
        }

        Ok(emitted)
    }
}

/// Join an object member name onto a path.
fn member_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}{MEMBER_SEPARATOR}{name}")
    }
}

/// Convert a JSON number to `f64`.
///
/// Integers are cast, floats pass through unchanged.
fn number_to_f64(n: &Number) -> Option<f64> {
    if let Some(i) = n.as_i64() {
        Some(i as f64)
    } else if let Some(u) = n.as_u64() {
        Some(u as f64)
    } else {
        n.as_f64()
    }
}
