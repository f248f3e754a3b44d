//! Unit and format conversions shared by the vendor mappers.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::error::MapError;

/// Seconds to whole minutes via floor division. None passes through.
pub(crate) fn secs_to_minutes(seconds: Option<i64>) -> Option<i64> {
    seconds.map(|s| s.div_euclid(60))
}

/// Convert a 0-100 percentage to a [0.0, 1.0] ratio, rounded to four
/// decimals.
///
/// Unconditional: each mapper knows its vendor's scale, so no guessing
/// from the value. Out-of-range inputs scale like any other and are left
/// for the validation engine to flag, not clamped here.
pub(crate) fn pct_to_ratio(value: f64) -> f64 {
    (value / 100.0 * 10_000.0).round() / 10_000.0
}

/// Parse an ISO-8601 timestamp with a mandatory UTC offset.
///
/// A string that parses as a naive datetime is a distinct failure
/// (`timezone` rule) from one that is not a timestamp at all.
pub(crate) fn parse_iso_instant(
    field: &'static str,
    raw: &str,
) -> Result<DateTime<FixedOffset>, MapError> {
    DateTime::parse_from_rfc3339(raw).map_err(|_| {
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").is_ok();
        if naive {
            MapError::NaiveTimestamp {
                field,
                value: raw.to_string(),
            }
        } else {
            MapError::InvalidTimestamp {
                field,
                value: raw.to_string(),
            }
        }
    })
}

/// Parse a `YYYY-MM-DD` calendar date.
pub(crate) fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, MapError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| MapError::InvalidDate {
        field,
        value: raw.to_string(),
    })
}

/// Resolve an IANA zone name (e.g. `America/Chicago`).
pub(crate) fn parse_zone(field: &'static str, name: &str) -> Result<Tz, MapError> {
    name.parse::<Tz>().map_err(|_| MapError::UnknownTimezone {
        field,
        value: name.to_string(),
    })
}

/// Convert Unix epoch seconds to a timezone-aware instant.
///
/// When the vendor supplies an IANA zone the instant is rendered in that
/// zone, preserving the wearer's local wall-clock moment; otherwise UTC.
pub(crate) fn epoch_to_instant(
    field: &'static str,
    seconds: i64,
    zone: Option<Tz>,
) -> Result<DateTime<FixedOffset>, MapError> {
    let utc = Utc
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| MapError::InvalidTimestamp {
            field,
            value: seconds.to_string(),
        })?;
    Ok(match zone {
        Some(tz) => utc.with_timezone(&tz).fixed_offset(),
        None => utc.fixed_offset(),
    })
}

/// Render a JSON scalar as a string identifier (Withings ids are numbers).
pub(crate) fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_floor_to_minutes() {
        assert_eq!(secs_to_minutes(Some(25_200)), Some(420));
        assert_eq!(secs_to_minutes(Some(119)), Some(1));
        assert_eq!(secs_to_minutes(Some(-300)), Some(-5));
        assert_eq!(secs_to_minutes(None), None);
    }

    #[test]
    fn percentages_scale_to_ratios_unconditionally() {
        assert_eq!(pct_to_ratio(85.0), 0.85);
        assert_eq!(pct_to_ratio(91.5), 0.915);
        // Low percentages are still percentages, not ratios.
        assert_eq!(pct_to_ratio(1.0), 0.01);
        // Out-of-range values survive for the validation engine to catch.
        assert_eq!(pct_to_ratio(150.0), 1.5);
    }

    #[test]
    fn iso_instants_require_an_offset() {
        let aware = parse_iso_instant("bedtime_start", "2024-01-15T23:05:00-06:00")
            .expect("offset timestamp parses");
        assert_eq!(aware.offset().local_minus_utc(), -6 * 3600);

        let err = parse_iso_instant("bedtime_start", "2024-01-15T23:05:00")
            .expect_err("naive timestamp rejected");
        assert!(matches!(err, MapError::NaiveTimestamp { .. }));

        let err = parse_iso_instant("bedtime_start", "not-a-time").expect_err("garbage rejected");
        assert!(matches!(err, MapError::InvalidTimestamp { .. }));
    }

    #[test]
    fn epoch_rendered_in_vendor_zone() {
        let zone = parse_zone("timezone", "America/Chicago").expect("known zone");
        // 2024-01-15 is CST (UTC-6).
        let instant = epoch_to_instant("startdate", 1_705_363_200, Some(zone)).expect("in range");
        assert_eq!(instant.offset().local_minus_utc(), -6 * 3600);
        assert_eq!(instant.timestamp(), 1_705_363_200);
    }

    #[test]
    fn unknown_zone_is_a_mapping_failure() {
        let err = parse_zone("timezone", "Mars/Olympus_Mons").expect_err("unknown zone");
        assert_eq!(err.rule(), "timezone");
    }
}
