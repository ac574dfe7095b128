//! Lenient timestamp parsing for strategy documents.
//!
//! Documents are written as RFC 3339. Older documents carry naive ISO-8601
//! local times without an offset ("2025-01-15T10:30:00.123456"); those are
//! read as UTC.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_timestamp(&text)
        .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", text)))
}

pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(text) => parse_timestamp(&text)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", text))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn rfc3339_keeps_offset_converted_to_utc() {
        let ts = parse_timestamp("2025-01-15T12:30:00+02:00").unwrap();
        assert_eq!(ts.hour(), 10);
    }

    #[test]
    fn naive_iso_is_read_as_utc() {
        let ts = parse_timestamp("2025-01-15T10:30:00.123456").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-01-15T10:30:00.123456+00:00");

        let whole = parse_timestamp("2025-01-10T09:00:00").unwrap();
        assert_eq!(whole.minute(), 0);
        assert!(parse_timestamp("2025-01-10 09:00:00").is_some());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
