//! Layered settings lookup with silent coercion
//!
//! Stored settings come in ordered layers (innermost first). A lookup returns
//! the value from the first layer that holds the key; if that value cannot be
//! coerced to the requested type the compiled-in default is used instead.
//! Nothing in this module returns an error.

use serde_yaml::Value;
use std::collections::HashMap;

/// One layer of opaque key/value settings
pub type SettingsLayer = HashMap<String, Value>;

/// Ordered stack of settings layers
#[derive(Debug, Clone, Default)]
pub struct LayeredSettings<'a> {
    layers: Vec<&'a SettingsLayer>,
}

impl<'a> LayeredSettings<'a> {
    /// Build from layers ordered by precedence, highest first
    pub fn new(layers: Vec<&'a SettingsLayer>) -> Self {
        Self { layers }
    }

    /// First non-null value stored under `key`
    pub fn lookup(&self, key: &str) -> Option<&'a Value> {
        self.layers
            .iter()
            .filter_map(|layer| layer.get(key))
            .find(|value| !value.is_null())
    }

    /// String value, or `default` when absent, empty, or not a scalar
    pub fn string(&self, key: &str, default: &str) -> String {
        self.lookup(key)
            .map(|value| coerce_string(value).unwrap_or_else(|| default.to_string()))
            .unwrap_or_else(|| default.to_string())
    }

    /// Positive finite float, or `default`
    pub fn float(&self, key: &str, default: f64) -> f64 {
        self.lookup(key)
            .map(|value| coerce_float(value, default))
            .unwrap_or(default)
    }

    /// Boolean flag, or `default`
    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.lookup(key)
            .map(|value| coerce_flag(value, default))
            .unwrap_or(default)
    }
}

/// Return the first present candidate, else `default`
pub fn resolve_first<T>(candidates: impl IntoIterator<Item = Option<T>>, default: T) -> T {
    candidates.into_iter().flatten().next().unwrap_or(default)
}

/// Parse a float, falling back to `default` for anything unusable.
///
/// Accepted values are finite and strictly positive.
pub fn parse_float_or_default(raw: &str, default: f64) -> f64 {
    raw.trim()
        .parse::<f64>()
        .map(|value| float_or_default(value, default))
        .unwrap_or(default)
}

/// Keep `value` if it is finite and positive, otherwise `default`
pub fn float_or_default(value: f64, default: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        default
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn coerce_float(value: &Value, default: f64) -> f64 {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(|f| float_or_default(f, default))
            .unwrap_or(default),
        Value::String(s) => parse_float_or_default(s, default),
        _ => default,
    }
}

fn coerce_flag(value: &Value, default: bool) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => match n.as_i64() {
            Some(0) => false,
            Some(1) => true,
            _ => default,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => true,
            "false" | "off" | "no" | "0" => false,
            _ => default,
        },
        _ => default,
    }
}
