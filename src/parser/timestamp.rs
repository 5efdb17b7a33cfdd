use crate::config::types::TimestampConfig;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("unknown time zone '{0}'")]
    UnknownZone(String),

    #[error("format '{0}' has no offset specifier but honor_offset is set")]
    MissingOffset(String),

    #[error("failed to parse timestamp '{value}' with format '{format}': {source}")]
    ParseError {
        value: String,
        format: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("timestamp '{value}' does not exist in zone {zone}")]
    Nonexistent { value: String, zone: Tz },
}

/// Turns the bracketed access-log timestamp text into an instant.
///
/// By default the wall-clock part is read in the configured zone and the
/// literal offset text is ignored. With `honor_offset` the literal offset
/// decides instead.
#[derive(Debug, Clone)]
pub struct TimestampResolver {
    format: String,
    zone: Tz,
    honor_offset: bool,
}

impl TimestampResolver {
    pub fn new(format: &str, zone: &str, honor_offset: bool) -> Result<Self, TimestampError> {
        let zone: Tz = zone
            .parse()
            .map_err(|_| TimestampError::UnknownZone(zone.to_string()))?;

        if honor_offset && !has_offset_specifier(format) {
            return Err(TimestampError::MissingOffset(format.to_string()));
        }

        Ok(Self {
            format: format.to_string(),
            zone,
            honor_offset,
        })
    }

    pub fn from_config(config: &TimestampConfig) -> Result<Self, TimestampError> {
        Self::new(&config.format, &config.zone, config.honor_offset)
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    pub fn resolve(&self, value: &str) -> Result<DateTime<Utc>, TimestampError> {
        let parse_err = |source| TimestampError::ParseError {
            value: value.to_string(),
            format: self.format.clone(),
            source,
        };

        if self.honor_offset {
            return DateTime::parse_from_str(value, &self.format)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(parse_err);
        }

        // NaiveDateTime parsing accepts and discards any offset in the text
        let naive = NaiveDateTime::parse_from_str(value, &self.format).map_err(parse_err)?;

        self.zone
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| TimestampError::Nonexistent {
                value: value.to_string(),
                zone: self.zone,
            })
    }
}

fn has_offset_specifier(format: &str) -> bool {
    format.contains("%z") || format.contains("%:z") || format.contains("%#z")
}

#[cfg(test)]
mod tests {
    use super::*;

    const NGINX_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

    #[test]
    fn test_fixed_zone_ignores_literal_offset() {
        let resolver = TimestampResolver::new(NGINX_FORMAT, "Asia/Shanghai", false).unwrap();

        let result = resolver.resolve("04/Mar/2018:13:49:52 +0000").unwrap();

        // 13:49:52 in Shanghai (UTC+8) is 05:49:52 UTC
        assert_eq!(result.to_rfc3339(), "2018-03-04T05:49:52+00:00");
    }

    #[test]
    fn test_fixed_zone_any_offset_text_same_instant() {
        let resolver = TimestampResolver::new(NGINX_FORMAT, "Asia/Shanghai", false).unwrap();

        let a = resolver.resolve("04/Mar/2018:13:49:52 +0000").unwrap();
        let b = resolver.resolve("04/Mar/2018:13:49:52 -0700").unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_honor_offset_uses_literal_offset() {
        let resolver = TimestampResolver::new(NGINX_FORMAT, "Asia/Shanghai", true).unwrap();

        let result = resolver.resolve("04/Mar/2018:13:49:52 +0530").unwrap();

        assert_eq!(result.to_rfc3339(), "2018-03-04T08:19:52+00:00");
    }

    #[test]
    fn test_unparseable_timestamp() {
        let resolver = TimestampResolver::new(NGINX_FORMAT, "Asia/Shanghai", false).unwrap();

        let result = resolver.resolve("31/Foo/2018:13:49:52 +0000");

        assert!(matches!(result, Err(TimestampError::ParseError { .. })));
    }

    #[test]
    fn test_nonexistent_local_time() {
        // Clocks in New York jumped from 02:00 to 03:00 on 2018-03-11
        let resolver = TimestampResolver::new(NGINX_FORMAT, "America/New_York", false).unwrap();

        let result = resolver.resolve("11/Mar/2018:02:30:00 +0000");

        assert!(matches!(result, Err(TimestampError::Nonexistent { .. })));
    }

    #[test]
    fn test_unknown_zone() {
        let result = TimestampResolver::new(NGINX_FORMAT, "Nowhere/Special", false);

        assert!(matches!(result, Err(TimestampError::UnknownZone(_))));
    }

    #[test]
    fn test_honor_offset_requires_offset_specifier() {
        let result = TimestampResolver::new("%d/%b/%Y:%H:%M:%S", "UTC", true);

        assert!(matches!(result, Err(TimestampError::MissingOffset(_))));
    }
}
