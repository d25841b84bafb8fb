//! Output - converter result
//!
//! One structured measurement point destined for time-series storage.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field value of a measurement point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    UInteger(u64),
    Float(f64),
    String(String),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        Self::UInteger(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::UInteger(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

/// Measurement point
///
/// Immutable once emitted. Owned by the fan-out router until handed to a
/// batch writer, which owns it until flush.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    /// Measurement name (empty = use the converter instance default)
    pub measurement: String,

    /// Tags (indexed, string-valued)
    pub tags: BTreeMap<String, String>,

    /// Fields (at least one expected by the storage backend)
    pub fields: BTreeMap<String, FieldValue>,

    /// Point timestamp (UTC)
    pub time: DateTime<Utc>,

    /// Precision the timestamp has been truncated to, set by the batch writer
    #[serde(default, with = "humantime_serde")]
    pub precision: Option<Duration>,
}

impl Output {
    /// Create an output without tags or fields
    pub fn new(measurement: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            time,
            precision: None,
        }
    }

    /// Add a tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add a field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Copy of this output with its timestamp rounded down to `precision`
    pub fn truncated(&self, precision: Duration) -> Self {
        Self {
            time: truncate_time(self.time, precision),
            precision: Some(precision),
            ..self.clone()
        }
    }
}

/// Round a timestamp down to a multiple of `precision` since the Unix epoch
///
/// A zero precision, or a timestamp outside the nanosecond range, is returned unchanged.
pub fn truncate_time(time: DateTime<Utc>, precision: Duration) -> DateTime<Utc> {
    let Ok(step) = i64::try_from(precision.as_nanos()) else {
        return time;
    };
    if step == 0 {
        return time;
    }
    let Some(nanos) = time.timestamp_nanos_opt() else {
        return time;
    };
    DateTime::from_timestamp_nanos(nanos - nanos.rem_euclid(step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_millis(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_truncate_to_second() {
        let a = at_millis(1_700_000_000_120);
        let b = at_millis(1_700_000_000_130);
        let precision = Duration::from_secs(1);
        assert_eq!(truncate_time(a, precision), truncate_time(b, precision));
        assert_eq!(truncate_time(a, precision), at_millis(1_700_000_000_000));
    }

    #[test]
    fn test_truncate_keeps_exact_multiples() {
        let t = at_millis(1_700_000_001_000);
        assert_eq!(truncate_time(t, Duration::from_secs(1)), t);
        assert_eq!(truncate_time(t, Duration::ZERO), t);
    }

    #[test]
    fn test_truncate_before_epoch_rounds_down() {
        let t = at_millis(-1_500);
        assert_eq!(truncate_time(t, Duration::from_secs(1)), at_millis(-2_000));
    }

    #[test]
    fn test_truncated_output_records_precision() {
        let out = Output::new("temperature", at_millis(1_250))
            .with_tag("room", "kitchen")
            .with_field("value", 21.5);
        let truncated = out.truncated(Duration::from_millis(100));
        assert_eq!(truncated.time, at_millis(1_200));
        assert_eq!(truncated.precision, Some(Duration::from_millis(100)));
        assert_eq!(truncated.tags, out.tags);
        assert_eq!(out.precision, None);
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::from(21.5).to_string(), "21.5");
        assert_eq!(FieldValue::from(true).to_string(), "true");
        assert_eq!(FieldValue::from("on").to_string(), "on");
    }
}
