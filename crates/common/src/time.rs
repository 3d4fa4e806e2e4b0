//! Timestamp helpers.
//!
//! Integration events carry Unix seconds; storage keeps microsecond
//! precision, so in-process timestamps are truncated to match.

use chrono::{DateTime, SubsecRound, TimeZone, Utc};

/// Current time truncated to microseconds.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Converts a timestamp to whole Unix seconds.
pub fn to_unix(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}

/// Converts Unix seconds back to a timestamp. Out-of-range values clamp to the epoch.
pub fn from_unix(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_conversion_drops_subseconds() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 30).unwrap();
        let seconds = to_unix(at);
        assert_eq!(seconds, 1_714_564_830);
        assert_eq!(from_unix(seconds), at);
    }

    #[test]
    fn now_has_microsecond_precision() {
        assert_eq!(now().timestamp_subsec_nanos() % 1_000, 0);
    }
}
