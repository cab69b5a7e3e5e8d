//! Date strings at the storage boundary
//!
//! New records carry RFC 3339 UTC timestamps. Older clients wrote a
//! medium-date/long-time rendering such as `Sep 1, 2020 at 3:04:05 PM UTC`;
//! [`parse_date`] reads both so existing conversations stay readable.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

const LEGACY_FORMAT: &str = "%b %-d, %Y at %-I:%M:%S %p";
const LEGACY_ZONES: [&str; 2] = ["UTC", "GMT"];

/// How dates are written into records and summaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// `2020-09-01T15:04:05.000Z`
    #[default]
    Rfc3339,
    /// `Sep 1, 2020 at 3:04:05 PM UTC`
    Legacy,
}

impl DateFormat {
    pub fn format(&self, at: &DateTime<Utc>) -> String {
        match self {
            DateFormat::Rfc3339 => at.to_rfc3339_opts(SecondsFormat::Millis, true),
            DateFormat::Legacy => format!("{} UTC", at.format(LEGACY_FORMAT)),
        }
    }
}

/// Parse a stored date in either supported format
pub fn parse_date(text: &str) -> Result<DateTime<Utc>, DecodeError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Ok(at.with_timezone(&Utc));
    }
    parse_legacy(text).ok_or_else(|| DecodeError::InvalidDate(text.to_string()))
}

fn parse_legacy(text: &str) -> Option<DateTime<Utc>> {
    // Newer platform formatters put a narrow no-break space before AM/PM.
    let normalized = text.replace('\u{202f}', " ");
    let (rest, zone) = normalized.trim().rsplit_once(' ')?;
    if !LEGACY_ZONES.contains(&zone) {
        return None;
    }
    NaiveDateTime::parse_from_str(rest, LEGACY_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 9, 1, 15, 4, 5).unwrap()
    }

    #[test]
    fn test_rfc3339_format() {
        assert_eq!(
            DateFormat::Rfc3339.format(&sample()),
            "2020-09-01T15:04:05.000Z"
        );
    }

    #[test]
    fn test_legacy_format() {
        assert_eq!(
            DateFormat::Legacy.format(&sample()),
            "Sep 1, 2020 at 3:04:05 PM UTC"
        );
    }

    #[test]
    fn test_parse_both_formats() {
        for format in [DateFormat::Rfc3339, DateFormat::Legacy] {
            assert_eq!(parse_date(&format.format(&sample())).unwrap(), sample());
        }
        assert_eq!(
            parse_date("Sep 1, 2020 at 3:04:05\u{202f}PM GMT").unwrap(),
            sample()
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_date("yesterday"),
            Err(DecodeError::InvalidDate(_))
        ));
        assert!(parse_date("Sep 1, 2020 at 3:04:05 PM PDT").is_err());
    }
}
