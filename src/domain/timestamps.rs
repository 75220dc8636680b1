//! System-owned `created_at` / `updated_at` values.
//!
//! Stored as RFC 3339 UTC with fixed microsecond precision so that string
//! comparison in SQL matches chronological order.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_ts() -> String {
    format_ts(Utc::now())
}

/// Next `updated_at` after `previous`: the current time, bumped by one
/// microsecond past `previous` when the clock hasn't moved (or went back).
pub fn next_updated_at(previous: &str) -> String {
    next_updated_at_from(previous, Utc::now())
}

pub(crate) fn next_updated_at_from(previous: &str, now: DateTime<Utc>) -> String {
    match DateTime::parse_from_rfc3339(previous) {
        Ok(prev) => {
            let prev = prev.with_timezone(&Utc);
            if now > prev {
                format_ts(now)
            } else {
                format_ts(prev + Duration::microseconds(1))
            }
        }
        Err(_) => {
            log::warn!("unparseable updated_at {:?}, resetting to now", previous);
            format_ts(now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(us: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_740_000_000, 0).unwrap() + Duration::microseconds(us)
    }

    #[test]
    fn fixed_width_micros() {
        assert_eq!(format_ts(at(5)), "2025-02-19T21:20:00.000005Z");
    }

    #[test]
    fn advances_to_now_when_clock_moved() {
        let prev = format_ts(at(0));
        assert_eq!(next_updated_at_from(&prev, at(10)), format_ts(at(10)));
    }

    #[test]
    fn bumps_within_same_tick() {
        let prev = format_ts(at(0));
        let next = next_updated_at_from(&prev, at(0));
        assert_eq!(next, format_ts(at(1)));
        assert!(next > prev);
    }

    #[test]
    fn survives_clock_going_back() {
        let prev = format_ts(at(100));
        let next = next_updated_at_from(&prev, at(3));
        assert!(next > prev);
    }

    #[test]
    fn garbage_previous_resets_to_now() {
        assert_eq!(next_updated_at_from("yesterday", at(7)), format_ts(at(7)));
    }
}
