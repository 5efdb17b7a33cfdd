use chrono::{DateTime, Utc};

/// One parsed access-log line.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    /// Percent-decoded request path; query string and fragment removed.
    pub path: String,
    pub scheme: String,
    /// Three-digit status code, kept as text.
    pub status: String,
    pub bytes_sent: u64,
    /// Seconds; `-` in the source becomes 0.
    pub upstream_time: f64,
    /// Seconds; `-` in the source becomes 0.
    pub request_time: f64,
}
