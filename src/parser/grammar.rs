use crate::config::types::TimestampConfig;
use crate::parser::record::Record;
use crate::parser::timestamp::{TimestampError, TimestampResolver};
use percent_encoding::percent_decode;
use regex::Regex;
use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;
use url::Url;

/// `ADDR - - [TIMESTAMP] SCHEME "METHOD TARGET PROTOCOL" STATUS BYTES "REFERER" "UA" "UPSTREAM_ADDR" UPSTREAM_TIME REQUEST_TIME`
const ACCESS_LOG_PATTERN: &str = concat!(
    r#"^(?P<addr>[0-9A-Fa-f.:]+)\s+(?P<ident>[^ \[]+)\s+(?P<user>[^ \[]+)\s+"#,
    r#"\[(?P<time>[^\]]+)\]\s+(?P<scheme>[a-z]+)\s+"(?P<request>[^"]+)"\s+"#,
    r#"(?P<status>\d{3})\s+(?P<bytes>\d+)\s+"(?P<referer>[^"]+)"\s+"(?P<agent>.*?)"\s+"#,
    r#""(?P<upstream_addr>[^"]+)"\s+(?P<upstream_time>[\d.-]+)\s+(?P<request_time>[\d.-]+)\s*$"#,
);

/// Why a line was discarded.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("line does not match the access log format")]
    NoMatch,

    #[error("request line '{0}' is not 'METHOD TARGET PROTOCOL'")]
    RequestLine(String),

    #[error("request target '{0}' is not a valid URL path")]
    Target(String),

    #[error(transparent)]
    Timestamp(#[from] TimestampError),

    #[error("invalid byte count '{value}': {source}")]
    ByteCount {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid {field} '{value}'")]
    Duration {
        field: &'static str,
        value: String,
        #[source]
        source: Option<ParseFloatError>,
    },
}

/// Compiled access-log grammar plus timestamp rules. Pure: the same bytes
/// always produce the same result.
#[derive(Debug, Clone)]
pub struct AccessLogParser {
    pattern: Regex,
    /// Base that origin-form targets (`/path?query`) are resolved against.
    origin: Url,
    timestamps: TimestampResolver,
}

impl AccessLogParser {
    pub fn new(timestamps: TimestampResolver) -> Self {
        Self {
            pattern: Regex::new(ACCESS_LOG_PATTERN).expect("access log pattern is valid"),
            origin: Url::parse("http://localhost/").expect("origin base is a valid URL"),
            timestamps,
        }
    }

    pub fn from_config(config: &TimestampConfig) -> Result<Self, TimestampError> {
        Ok(Self::new(TimestampResolver::from_config(config)?))
    }

    pub fn parse(&self, line: &[u8]) -> Result<Record, ParseError> {
        let line = std::str::from_utf8(line)?;
        let caps = self.pattern.captures(line).ok_or(ParseError::NoMatch)?;

        let timestamp = self.timestamps.resolve(&caps["time"])?;

        let bytes = &caps["bytes"];
        let bytes_sent = bytes.parse::<u64>().map_err(|source| ParseError::ByteCount {
            value: bytes.to_string(),
            source,
        })?;

        let request = &caps["request"];
        let (method, target) = match request.split(' ').collect::<Vec<_>>()[..] {
            [method, target, _protocol] => (method, target),
            _ => return Err(ParseError::RequestLine(request.to_string())),
        };

        Ok(Record {
            timestamp,
            method: method.to_string(),
            path: self.request_path(target)?,
            scheme: caps["scheme"].to_string(),
            status: caps["status"].to_string(),
            bytes_sent,
            upstream_time: parse_duration("upstream time", &caps["upstream_time"])?,
            request_time: parse_duration("request time", &caps["request_time"])?,
        })
    }

    /// Percent-decoded path of a request target, without query or fragment.
    /// Absolute-form targets (`http://host/path`) keep only their path.
    fn request_path(&self, target: &str) -> Result<String, ParseError> {
        let invalid = || ParseError::Target(target.to_string());

        // The URL parser passes bad escapes through untouched
        let before_query = target.split('?').next().unwrap_or(target);
        if has_invalid_escape(before_query) {
            return Err(invalid());
        }

        let url = Url::options()
            .base_url(Some(&self.origin))
            .parse(target)
            .map_err(|_| invalid())?;

        percent_decode(url.path().as_bytes())
            .decode_utf8()
            .map(|path| path.into_owned())
            .map_err(|_| invalid())
    }
}

/// A `%` not followed by two hex digits.
fn has_invalid_escape(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !matches!(
                bytes.get(i + 1..i + 3),
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit()
            )
    })
}

fn parse_duration(field: &'static str, value: &str) -> Result<f64, ParseError> {
    if value == "-" {
        return Ok(0.0);
    }

    let seconds = value.parse::<f64>().map_err(|e| ParseError::Duration {
        field,
        value: value.to_string(),
        source: Some(e),
    })?;

    if seconds.is_finite() && seconds >= 0.0 {
        Ok(seconds)
    } else {
        Err(ParseError::Duration {
            field,
            value: value.to_string(),
            source: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const SAMPLE: &str = r#"172.0.0.12 - - [04/Mar/2018:13:49:52 +0000] http "GET /foo?query=t HTTP/1.0" 200 2133 "-" "KeepAliveClient" "-" 1.005 1.854"#;

    fn parser() -> AccessLogParser {
        AccessLogParser::from_config(&TimestampConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_sample_line() {
        let record = parser().parse(SAMPLE.as_bytes()).unwrap();

        assert_eq!(record.method, "GET");
        assert_eq!(record.path, "/foo");
        assert_eq!(record.scheme, "http");
        assert_eq!(record.status, "200");
        assert_eq!(record.bytes_sent, 2133);
        assert_eq!(record.upstream_time, 1.005);
        assert_eq!(record.request_time, 1.854);
        assert_eq!(
            record.timestamp,
            Utc.with_ymd_and_hms(2018, 3, 4, 5, 49, 52).unwrap()
        );
    }

    #[test]
    fn test_dash_durations_become_zero() {
        let line = SAMPLE.replace("1.005 1.854", "- -");
        let record = parser().parse(line.as_bytes()).unwrap();

        assert_eq!(record.upstream_time, 0.0);
        assert_eq!(record.request_time, 0.0);
    }

    #[test]
    fn test_upstream_address_with_port() {
        let line = SAMPLE.replace(r#""-" 1.005"#, r#""10.0.0.3:8080" 1.005"#);
        let record = parser().parse(line.as_bytes()).unwrap();

        assert_eq!(record.upstream_time, 1.005);
    }

    #[test]
    fn test_path_without_query_is_unchanged() {
        let line = SAMPLE.replace("/foo?query=t", "/api/v1/users");
        let record = parser().parse(line.as_bytes()).unwrap();

        assert_eq!(record.path, "/api/v1/users");
    }

    #[test]
    fn test_fragment_is_stripped() {
        let line = SAMPLE.replace("/foo?query=t", "/docs#intro");
        let record = parser().parse(line.as_bytes()).unwrap();

        assert_eq!(record.path, "/docs");
    }

    #[test]
    fn test_percent_encoded_path_is_decoded() {
        let line = SAMPLE.replace("/foo?query=t", "/a%20b/caf%C3%A9?x=1");
        let record = parser().parse(line.as_bytes()).unwrap();

        assert_eq!(record.path, "/a b/café");
    }

    #[test]
    fn test_absolute_form_target_keeps_only_path() {
        let line = SAMPLE.replace("/foo?query=t", "http://example.com/foo?q=1");
        let record = parser().parse(line.as_bytes()).unwrap();

        assert_eq!(record.path, "/foo");
    }

    #[test]
    fn test_invalid_escape_in_target_rejected() {
        for target in ["/bad%zzpath", "/trailing%2", "/cut%"] {
            let line = SAMPLE.replace("/foo?query=t", target);
            let result = parser().parse(line.as_bytes());

            assert!(
                matches!(result, Err(ParseError::Target(ref t)) if t == target),
                "{target}: {result:?}"
            );
        }
    }

    #[test]
    fn test_escapes_in_query_are_ignored() {
        let line = SAMPLE.replace("/foo?query=t", "/search?q=100%");
        let record = parser().parse(line.as_bytes()).unwrap();

        assert_eq!(record.path, "/search");
    }

    #[test]
    fn test_two_token_request_line_rejected() {
        let line = SAMPLE.replace("GET /foo?query=t HTTP/1.0", "GET HTTP/1.0");
        let result = parser().parse(line.as_bytes());

        assert!(matches!(result, Err(ParseError::RequestLine(ref r)) if r == "GET HTTP/1.0"));
    }

    #[test]
    fn test_four_token_request_line_rejected() {
        let line = SAMPLE.replace("GET /foo?query=t", "GET /foo extra");
        let result = parser().parse(line.as_bytes());

        assert!(matches!(result, Err(ParseError::RequestLine(_))));
    }

    #[test]
    fn test_truncated_line_rejected() {
        let truncated = &SAMPLE[..SAMPLE.len() - " 1.854".len()];
        assert!(matches!(
            parser().parse(truncated.as_bytes()),
            Err(ParseError::NoMatch)
        ));

        let cut_mid_field = &SAMPLE[..40];
        assert!(matches!(
            parser().parse(cut_mid_field.as_bytes()),
            Err(ParseError::NoMatch)
        ));
    }

    #[test]
    fn test_garbage_and_empty_lines_rejected() {
        assert!(matches!(parser().parse(b""), Err(ParseError::NoMatch)));
        assert!(matches!(
            parser().parse(b"this is not an access log"),
            Err(ParseError::NoMatch)
        ));
        assert!(matches!(
            parser().parse(&[0xff, 0xfe, b' ']),
            Err(ParseError::NotUtf8(_))
        ));
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let line = SAMPLE.replace("04/Mar/2018", "04/Xyz/2018");
        let result = parser().parse(line.as_bytes());

        assert!(matches!(result, Err(ParseError::Timestamp(_))));
    }

    #[test]
    fn test_overflowing_byte_count_rejected() {
        let line = SAMPLE.replace(" 2133 ", " 99999999999999999999999 ");
        let result = parser().parse(line.as_bytes());

        assert!(matches!(result, Err(ParseError::ByteCount { .. })));
    }

    #[test]
    fn test_malformed_duration_rejected() {
        let line = SAMPLE.replace("1.005 1.854", "1.005 1..854");
        assert!(matches!(
            parser().parse(line.as_bytes()),
            Err(ParseError::Duration { field: "request time", .. })
        ));

        let negative = SAMPLE.replace("1.005 1.854", "-1.5 1.854");
        assert!(matches!(
            parser().parse(negative.as_bytes()),
            Err(ParseError::Duration { field: "upstream time", .. })
        ));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let parser = parser();

        let first = parser.parse(SAMPLE.as_bytes()).unwrap();
        let second = parser.parse(SAMPLE.as_bytes()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_bad_line_does_not_affect_next() {
        let parser = parser();

        assert!(parser.parse(b"garbage").is_err());
        assert!(parser.parse(SAMPLE.as_bytes()).is_ok());
    }
}
