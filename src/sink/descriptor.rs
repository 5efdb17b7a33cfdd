use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("expected 5 '@'-separated segments (endpoint@username@password@namespace@precision), found {0}")]
    SegmentCount(usize),

    #[error("{0} cannot be empty")]
    EmptySegment(&'static str),

    #[error("endpoint '{0}' must start with http:// or https://")]
    InvalidEndpoint(String),

    #[error("unknown precision '{0}' (expected one of n, u, ms, s, m, h)")]
    InvalidPrecision(String),
}

/// Time resolution of point timestamps on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

impl Precision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Nanoseconds => "n",
            Precision::Microseconds => "u",
            Precision::Milliseconds => "ms",
            Precision::Seconds => "s",
            Precision::Minutes => "m",
            Precision::Hours => "h",
        }
    }
}

impl FromStr for Precision {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "n" | "ns" => Ok(Precision::Nanoseconds),
            "u" | "us" => Ok(Precision::Microseconds),
            "ms" => Ok(Precision::Milliseconds),
            "s" => Ok(Precision::Seconds),
            "m" => Ok(Precision::Minutes),
            "h" => Ok(Precision::Hours),
            other => Err(DescriptorError::InvalidPrecision(other.to_string())),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings parsed from `endpoint@username@password@namespace@precision`.
#[derive(Clone, PartialEq, Eq)]
pub struct SinkDescriptor {
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub namespace: String,
    pub precision: Precision,
}

impl SinkDescriptor {
    pub fn parse(dsn: &str) -> Result<Self, DescriptorError> {
        let segments: Vec<&str> = dsn.split('@').collect();
        let [endpoint, username, password, namespace, precision] = segments[..] else {
            return Err(DescriptorError::SegmentCount(segments.len()));
        };

        if endpoint.is_empty() {
            return Err(DescriptorError::EmptySegment("endpoint"));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(DescriptorError::InvalidEndpoint(endpoint.to_string()));
        }
        if namespace.is_empty() {
            return Err(DescriptorError::EmptySegment("namespace"));
        }

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            namespace: namespace.to_string(),
            precision: precision.parse()?,
        })
    }
}

// Keeps the password out of logs
impl fmt::Debug for SinkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkDescriptor")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"***")
            .field("namespace", &self.namespace)
            .field("precision", &self.precision)
            .finish()
    }
}
