use crate::parser::Record;
use crate::sink::descriptor::{Precision, SinkDescriptor};
use chrono::{DateTime, Utc};

/// Per-sink metadata stamped onto every batch a writer builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    pub measurement: String,
    pub namespace: String,
    pub precision: Precision,
}

impl BatchSettings {
    pub fn new(measurement: &str, descriptor: &SinkDescriptor) -> Self {
        Self {
            measurement: measurement.to_string(),
            namespace: descriptor.namespace.clone(),
            precision: descriptor.precision,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

/// A single tagged, timestamped sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    /// Sorted by key.
    pub tags: Vec<(&'static str, String)>,
    /// Sorted by key.
    pub fields: Vec<(&'static str, FieldValue)>,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    pub fn from_record(measurement: &str, record: &Record) -> Self {
        Self {
            measurement: measurement.to_string(),
            tags: vec![
                ("Method", record.method.clone()),
                ("Path", record.path.clone()),
                ("Scheme", record.scheme.clone()),
                ("Status", record.status.clone()),
            ],
            fields: vec![
                (
                    "ByteSent",
                    FieldValue::Integer(i64::try_from(record.bytes_sent).unwrap_or(i64::MAX)),
                ),
                ("RequestTime", FieldValue::Float(record.request_time)),
                ("UpstreamTime", FieldValue::Float(record.upstream_time)),
            ],
            timestamp: record.timestamp,
        }
    }
}

/// Points submitted together in one write call.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub namespace: String,
    pub precision: Precision,
    pub points: Vec<Point>,
}

impl Batch {
    pub fn from_records(settings: &BatchSettings, records: &[Record]) -> Self {
        Self {
            namespace: settings.namespace.clone(),
            precision: settings.precision,
            points: records
                .iter()
                .map(|record| Point::from_record(&settings.measurement, record))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
