//! Measurement point model
//!
//! A [`Point`] is one measurement sample: a measurement name, a timestamp, a
//! set of tags and a set of typed fields. It is a single canonical value; the
//! two wire dialects are produced by stateless renderers in
//! [`crate::line_protocol`], so there is nothing to keep in sync.
//!
//! ```text
//! PointBuilder ──build()──► Point ──┬─► LineProtocol::Legacy  (v1 targets)
//!                                   └─► LineProtocol::Current (v2 targets)
//! ```

use crate::error::PointError;
use crate::line_protocol::{self, LineProtocol};
use std::collections::BTreeMap;
use std::fmt;

/// Typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Boolean(v) => write!(f, "{v}"),
            FieldValue::Integer(v) => write!(f, "{v}i"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::String(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(i64::from(v))
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Integer(i64::from(v))
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for FieldValue {
    fn from(v: usize) -> Self {
        FieldValue::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl TryFrom<&serde_json::Value> for FieldValue {
    type Error = ();

    /// Converts scalar JSON values. Nulls, arrays and objects have no field
    /// representation.
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Bool(b) => Ok(FieldValue::Boolean(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(FieldValue::Integer(i))
                } else {
                    n.as_f64().map(FieldValue::Float).ok_or(())
                }
            }
            serde_json::Value::String(s) => Ok(FieldValue::String(s.clone())),
            _ => Err(()),
        }
    }
}

/// Timestamp unit carried by a point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    Seconds,
    Milliseconds,
    Microseconds,
    #[default]
    Nanoseconds,
}

impl Precision {
    /// Query parameter value used by the write endpoints
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Seconds => "s",
            Precision::Milliseconds => "ms",
            Precision::Microseconds => "us",
            Precision::Nanoseconds => "ns",
        }
    }

    /// Converts a timestamp in this precision to nanoseconds
    pub fn to_nanos(&self, value: i64) -> i64 {
        let factor = match self {
            Precision::Seconds => 1_000_000_000,
            Precision::Milliseconds => 1_000_000,
            Precision::Microseconds => 1_000,
            Precision::Nanoseconds => 1,
        };
        value.saturating_mul(factor)
    }
}

/// A finished, immutable measurement point
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: Vec<(String, FieldValue)>,
    timestamp: i64,
    precision: Precision,
}

impl Point {
    /// Start building a point. Dashes in the measurement become underscores.
    pub fn builder(measurement: impl AsRef<str>) -> PointBuilder {
        PointBuilder::new(measurement)
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    /// Fields in insertion order
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Render this point as one line of the given dialect
    pub fn to_line_protocol(&self, dialect: LineProtocol) -> Result<String, PointError> {
        line_protocol::render(self, dialect)
    }
}

/// In-progress point
#[derive(Debug, Clone)]
pub struct PointBuilder {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: Vec<(String, FieldValue)>,
    timestamp: i64,
    precision: Precision,
}

impl PointBuilder {
    fn new(measurement: impl AsRef<str>) -> Self {
        Self {
            measurement: clean_identifier(&normalize_measurement(measurement.as_ref())),
            tags: BTreeMap::new(),
            fields: Vec::new(),
            timestamp: 0,
            precision: Precision::Nanoseconds,
        }
    }

    /// Add or replace a field. Unnamed fields and non-finite floats are
    /// dropped since neither dialect can carry them.
    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        let name = clean_identifier(&name.into());
        if name.is_empty() {
            return self;
        }
        let value = value.into();
        if let FieldValue::Float(f) = value {
            if !f.is_finite() {
                return self;
            }
        }
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    /// Add or replace a tag. Empty values are dropped.
    pub fn add_tag(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = clean_identifier(&name.into());
        let value = clean_identifier(&value.into());
        if !name.is_empty() && !value.is_empty() {
            self.tags.insert(name, value);
        }
        self
    }

    pub fn add_tags<I, K, V>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in tags {
            self.add_tag(k, v);
        }
        self
    }

    pub fn set_timestamp(&mut self, value: i64, precision: Precision) -> &mut Self {
        self.timestamp = value;
        self.precision = precision;
        self
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Freeze the point.
    ///
    /// Fails when there are no fields, and when the two dialects would render
    /// different measurement names.
    pub fn build(self) -> Result<Point, PointError> {
        if self.measurement.is_empty() {
            return Err(PointError::EmptyMeasurement);
        }
        if self.fields.is_empty() {
            return Err(PointError::NoFields {
                measurement: self.measurement,
            });
        }

        let point = Point {
            measurement: self.measurement,
            tags: self.tags,
            fields: self.fields,
            timestamp: self.timestamp,
            precision: self.precision,
        };
        line_protocol::verify_measurement(&point)?;
        Ok(point)
    }
}

/// Measurement names may not contain dashes
pub fn normalize_measurement(name: &str) -> String {
    name.trim().replace('-', "_")
}

/// Line breaks become spaces, and a backslash is dropped where it would
/// escape a separator, another backslash or the end of the token. Line
/// protocol has no way to carry either in names, keys or tag values.
fn clean_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw
        .chars()
        .map(|c| if matches!(c, '\n' | '\r') { ' ' } else { c })
        .peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && matches!(chars.peek(), None | Some(',' | '=' | ' ' | '\\')) {
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_normalizes_measurement() {
        let mut b = Point::builder("my-job-data");
        b.add_field("value", 1i64);
        let point = b.build().unwrap();
        assert_eq!(point.measurement(), "my_job_data");
    }

    #[test]
    fn test_point_without_fields_is_rejected() {
        let mut b = Point::builder("empty");
        b.add_tag("host", "a");
        let err = b.build().unwrap_err();
        assert_eq!(
            err,
            PointError::NoFields {
                measurement: "empty".into()
            }
        );
    }

    #[test]
    fn test_empty_measurement_is_rejected() {
        let mut b = Point::builder("  ");
        b.add_field("v", true);
        assert_eq!(b.build().unwrap_err(), PointError::EmptyMeasurement);
    }

    #[test]
    fn test_field_replacement_keeps_position() {
        let mut b = Point::builder("m");
        b.add_field("a", 1i64).add_field("b", 2i64).add_field("a", 3i64);
        let point = b.build().unwrap();
        assert_eq!(point.fields().len(), 2);
        assert_eq!(point.fields()[0], ("a".to_string(), FieldValue::Integer(3)));
    }

    #[test]
    fn test_non_finite_floats_dropped() {
        let mut b = Point::builder("m");
        b.add_field("nan", f64::NAN).add_field("ok", 0.5);
        let point = b.build().unwrap();
        assert!(point.field("nan").is_none());
        assert_eq!(point.field("ok"), Some(&FieldValue::Float(0.5)));
    }

    #[test]
    fn test_empty_tag_values_dropped() {
        let mut b = Point::builder("m");
        b.add_tag("empty", "").add_tag("host", "agent-1").add_field("v", 1i64);
        let point = b.build().unwrap();
        assert_eq!(point.tags().len(), 1);
        assert_eq!(point.tag("host"), Some("agent-1"));
    }

    #[test]
    fn test_tag_values_cannot_break_the_line() {
        let mut b = Point::builder("m");
        b.add_tag("workspace", "C:\\ws\\")
            .add_tag("path", "a\\ b")
            .add_tag("note", "first\nsecond")
            .add_tag("slashes", "\\\\")
            .add_field("multi\nline", 1i64)
            .add_field("\\", 2i64);
        let point = b.build().unwrap();
        assert_eq!(point.tag("workspace"), Some("C:\\ws"));
        assert_eq!(point.tag("path"), Some("a b"));
        assert_eq!(point.tag("note"), Some("first second"));
        assert_eq!(point.tag("slashes"), None);
        assert!(point.field("multi line").is_some());
        assert_eq!(point.fields().len(), 1);
    }

    #[test]
    fn test_string_field_values_kept_verbatim() {
        let mut b = Point::builder("m");
        b.add_field("message", "C:\\ws\\ and\nmore");
        let point = b.build().unwrap();
        assert_eq!(
            point.field("message"),
            Some(&FieldValue::String("C:\\ws\\ and\nmore".into()))
        );
    }

    #[test]
    fn test_json_scalar_conversion() {
        let v = serde_json::json!({"i": 3, "f": 1.5, "s": "x", "b": false, "n": null});
        assert_eq!(FieldValue::try_from(&v["i"]), Ok(FieldValue::Integer(3)));
        assert_eq!(FieldValue::try_from(&v["f"]), Ok(FieldValue::Float(1.5)));
        assert_eq!(FieldValue::try_from(&v["s"]), Ok(FieldValue::String("x".into())));
        assert_eq!(FieldValue::try_from(&v["b"]), Ok(FieldValue::Boolean(false)));
        assert!(FieldValue::try_from(&v["n"]).is_err());
    }

    #[test]
    fn test_precision_to_nanos() {
        assert_eq!(Precision::Milliseconds.to_nanos(2), 2_000_000);
        assert_eq!(Precision::Seconds.to_nanos(1), 1_000_000_000);
        assert_eq!(Precision::Nanoseconds.to_nanos(7), 7);
    }
}
