//! Line protocol rendering
//!
//! Two dialects are produced from the same [`Point`] through
//! [`influxdb::WriteQuery`]:
//!
//! - [`LineProtocol::Legacy`]: fields sorted by key, timestamp kept in the
//!   point's own precision (the v1 write call passes `precision=`).
//! - [`LineProtocol::Current`]: fields in insertion order, timestamp always
//!   in nanoseconds.
//!
//! Tags are sorted in both, so measurement, tags and fields always carry the
//! same content.

use crate::error::PointError;
use crate::point::{FieldValue, Point, Precision};
use influxdb::{Query, Timestamp, Type, WriteQuery};

/// Wire dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineProtocol {
    /// v1 write endpoint
    Legacy,
    /// v2 write endpoint and newer
    Current,
}

fn field_type(value: &FieldValue) -> Type {
    match value {
        FieldValue::Boolean(b) => Type::Boolean(*b),
        FieldValue::Integer(i) => Type::SignedInteger(*i),
        FieldValue::Float(f) => Type::Float(*f),
        FieldValue::String(s) => Type::Text(s.clone()),
    }
}

fn timestamp(point: &Point, dialect: LineProtocol) -> Result<Timestamp, PointError> {
    let (value, precision) = match dialect {
        LineProtocol::Legacy => (point.timestamp(), point.precision()),
        LineProtocol::Current => (
            point.precision().to_nanos(point.timestamp()),
            Precision::Nanoseconds,
        ),
    };
    let value = u128::try_from(value).map_err(|_| {
        PointError::Encoding(format!(
            "negative timestamp {value} on '{}'",
            point.measurement()
        ))
    })?;
    Ok(match precision {
        Precision::Seconds => Timestamp::Seconds(value),
        Precision::Milliseconds => Timestamp::Milliseconds(value),
        Precision::Microseconds => Timestamp::Microseconds(value),
        Precision::Nanoseconds => Timestamp::Nanoseconds(value),
    })
}

/// The write query for one point in the given dialect
pub fn write_query(point: &Point, dialect: LineProtocol) -> Result<WriteQuery, PointError> {
    let mut query = WriteQuery::new(timestamp(point, dialect)?, point.measurement());
    for (key, value) in point.tags() {
        query = query.add_tag(key.as_str(), Type::Text(value.clone()));
    }

    let mut fields: Vec<&(String, FieldValue)> = point.fields().iter().collect();
    if dialect == LineProtocol::Legacy {
        fields.sort_by(|a, b| a.0.cmp(&b.0));
    }
    for (key, value) in fields {
        query = query.add_field(key.as_str(), field_type(value));
    }
    Ok(query)
}

/// Render one point as a single line (no trailing newline)
pub fn render(point: &Point, dialect: LineProtocol) -> Result<String, PointError> {
    let query = write_query(point, dialect)?;
    let built = match dialect {
        LineProtocol::Legacy => query.build(),
        LineProtocol::Current => query.build_with_opts(true),
    };
    built
        .map(|valid| valid.get())
        .map_err(|e| PointError::Encoding(e.to_string()))
}

/// Render a batch, one point per line
pub fn render_batch(points: &[Point], dialect: LineProtocol) -> Result<String, PointError> {
    let mut body = String::new();
    for point in points {
        body.push_str(&render(point, dialect)?);
        body.push('\n');
    }
    Ok(body)
}

/// Fails when the two dialects render different measurement names
pub(crate) fn verify_measurement(point: &Point) -> Result<(), PointError> {
    let legacy_name = measurement_of(&render(point, LineProtocol::Legacy)?);
    let current_name = measurement_of(&render(point, LineProtocol::Current)?);
    if legacy_name != current_name {
        return Err(PointError::EncodingMismatch {
            legacy: legacy_name,
            current: current_name,
        });
    }
    Ok(())
}

/// Extract the unescaped measurement name of a rendered line
pub fn measurement_of(line: &str) -> String {
    let mut name = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    name.push(next);
                }
            }
            ',' | ' ' => break,
            c => name.push(c),
        }
    }
    name
}
