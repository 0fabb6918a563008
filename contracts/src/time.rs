use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Civil timezone of the service region. Timestamps without an offset are
/// interpreted in this zone.
pub const REFERENCE_TZ: Tz = chrono_tz::Europe::Stockholm;

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Parses an upstream timestamp.
///
/// Accepts RFC 3339 (including a trailing `Z`) as well as local timestamps
/// without an offset, which are localized to [`REFERENCE_TZ`]. Returns `None`
/// for anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .and_then(|naive| REFERENCE_TZ.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naive_timestamps_use_reference_zone() {
        // CEST, two hours ahead of UTC
        let parsed = parse_timestamp("2025-06-02T14:35:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 6, 2, 12, 35, 0).unwrap());

        // CET, one hour ahead of UTC
        let parsed = parse_timestamp("2025-01-15 08:00:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 15, 7, 0, 0).unwrap());
    }

    #[test]
    fn offsets_are_respected() {
        let zulu = parse_timestamp("2025-06-02T14:35:00Z").unwrap();
        assert_eq!(zulu, Utc.with_ymd_and_hms(2025, 6, 2, 14, 35, 0).unwrap());

        let offset = parse_timestamp("2025-06-02T14:35:00+02:00").unwrap();
        assert_eq!(offset, Utc.with_ymd_and_hms(2025, 6, 2, 12, 35, 0).unwrap());
    }

    #[test]
    fn garbage_is_none() {
        let invalids = ["", "   ", "tomorrow", "2025-13-40T99:00:00"];
        for invalid in &invalids {
            assert!(parse_timestamp(invalid).is_none(), "{:?}", invalid);
        }
    }
}
