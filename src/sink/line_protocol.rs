//! InfluxDB line protocol encoding.
//!
//! `measurement,tag=value,... field=value,... timestamp`, one point per line.

use crate::sink::batch::{Batch, FieldValue, Point};
use crate::sink::descriptor::Precision;
use crate::sink::traits::SinkError;
use chrono::{DateTime, Utc};
use std::fmt::Write;

pub fn encode_batch(batch: &Batch) -> Result<String, SinkError> {
    let mut body = String::new();
    for point in &batch.points {
        encode_point(&mut body, point, batch.precision)?;
        body.push('\n');
    }
    Ok(body)
}

fn encode_point(out: &mut String, point: &Point, precision: Precision) -> Result<(), SinkError> {
    out.push_str(&escape(&point.measurement, &[',', ' ']));

    for (key, value) in &point.tags {
        // Empty tag values are not representable
        if value.is_empty() {
            continue;
        }
        out.push(',');
        out.push_str(&escape(key, &[',', '=', ' ']));
        out.push('=');
        out.push_str(&escape(value, &[',', '=', ' ']));
    }

    for (i, (key, value)) in point.fields.iter().enumerate() {
        out.push(if i == 0 { ' ' } else { ',' });
        out.push_str(&escape(key, &[',', '=', ' ']));
        out.push('=');
        let written = match value {
            FieldValue::Float(v) => write!(out, "{}", v),
            FieldValue::Integer(v) => write!(out, "{}i", v),
        };
        written.map_err(encode_err)?;
    }

    write!(out, " {}", timestamp_at(point.timestamp, precision)?).map_err(encode_err)
}

fn encode_err(e: std::fmt::Error) -> SinkError {
    SinkError::Encode(e.to_string())
}

fn timestamp_at(timestamp: DateTime<Utc>, precision: Precision) -> Result<i64, SinkError> {
    let value = match precision {
        Precision::Nanoseconds => timestamp.timestamp_nanos_opt(),
        Precision::Microseconds => Some(timestamp.timestamp_micros()),
        Precision::Milliseconds => Some(timestamp.timestamp_millis()),
        Precision::Seconds => Some(timestamp.timestamp()),
        Precision::Minutes => Some(timestamp.timestamp().div_euclid(60)),
        Precision::Hours => Some(timestamp.timestamp().div_euclid(3600)),
    };

    value.ok_or_else(|| {
        SinkError::Encode(format!(
            "timestamp {} is out of range for precision {}",
            timestamp, precision
        ))
    })
}

/// Backslash-escape the characters in `special`; other backslashes pass
/// through unchanged.
fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
