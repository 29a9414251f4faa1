use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::OptionsError;

/// Key of the concurrency bound for operator callbacks
pub const MAX_PARALLEL: &str = "max_parallel";
/// Key of the buffered item count above which producers suspend
pub const HIGH_WATER_MARK: &str = "high_water_mark";
/// Key of the buffered item count at which suspended producers resume
pub const LOW_WATER_MARK: &str = "low_water_mark";

pub const DEFAULT_MAX_PARALLEL: usize = 1;
pub const DEFAULT_HIGH_WATER_MARK: usize = 16;
pub const DEFAULT_LOW_WATER_MARK: usize = 8;

/// A single configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<OptionValue>),
}

impl OptionValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OptionValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_i64().and_then(|n| usize::try_from(n).ok())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Int(i64::from(value))
    }
}

impl From<usize> for OptionValue {
    fn from(value: usize) -> Self {
        OptionValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

/// Configuration mapping passed to a stream
///
/// Well-known keys have typed builders; any other key is kept as-is so
/// operators and plugins can read their own settings through the same
/// referrer chain.
///
/// # Example
/// ```rust,ignore
/// let options = StreamOptions::new()
///     .max_parallel(4)
///     .set("label", "ingest");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamOptions {
    values: BTreeMap<String, OptionValue>,
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON object
    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        let options: StreamOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn to_json(&self) -> Result<String, OptionsError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Set any key (fluent interface)
    pub fn set(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn max_parallel(self, n: usize) -> Self {
        self.set(MAX_PARALLEL, n)
    }

    pub fn high_water_mark(self, n: usize) -> Self {
        self.set(HIGH_WATER_MARK, n)
    }

    pub fn low_water_mark(self, n: usize) -> Self {
        self.set(LOW_WATER_MARK, n)
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `other` on top of these options
    pub(crate) fn merge(&mut self, other: StreamOptions) {
        self.values.extend(other.values);
    }

    /// Check the well-known keys; unknown keys are never rejected
    pub fn validate(&self) -> Result<(), OptionsError> {
        if let Some(value) = self.get(MAX_PARALLEL) {
            positive(MAX_PARALLEL, value)?;
        }
        let high = match self.get(HIGH_WATER_MARK) {
            Some(value) => Some(positive(HIGH_WATER_MARK, value)?),
            None => None,
        };
        let low = match self.get(LOW_WATER_MARK) {
            Some(value) => Some(value.as_usize().ok_or_else(|| OptionsError::InvalidValue {
                key: LOW_WATER_MARK.to_string(),
                reason: "must be a non-negative integer".to_string(),
            })?),
            None => None,
        };

        if let (Some(high), Some(low)) = (high, low)
            && low > high
        {
            return Err(OptionsError::InvalidValue {
                key: LOW_WATER_MARK.to_string(),
                reason: format!("must not exceed {HIGH_WATER_MARK} ({high})"),
            });
        }

        Ok(())
    }
}

fn positive(key: &str, value: &OptionValue) -> Result<usize, OptionsError> {
    match value.as_usize() {
        Some(n) if n >= 1 => Ok(n),
        _ => Err(OptionsError::InvalidValue {
            key: key.to_string(),
            reason: "must be a positive integer".to_string(),
        }),
    }
}
