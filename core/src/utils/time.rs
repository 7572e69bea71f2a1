use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds between 1601-01-01 and 1970-01-01
const EPOCH_DIFFERENCE: i64 = 11644473600;
/// FILETIME ticks (100ns) per second
const TICKS_PER_SECOND: i64 = 10000000;

/// Current time as seconds since the UNIX epoch
pub(crate) fn time_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::new(0, 0))
        .as_secs()
}

/**
 * Convert a Windows FILETIME (100ns intervals since 1601) to a UTC datetime
 * Returns `None` when the value cannot be represented
 */
pub(crate) fn filetime_to_datetime(filetime: i64) -> Option<DateTime<Utc>> {
    let seconds = filetime.div_euclid(TICKS_PER_SECOND) - EPOCH_DIFFERENCE;
    let nanos = (filetime.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(seconds, nanos)
}

/// Convert a UTC datetime to a Windows FILETIME
pub(crate) fn datetime_to_filetime(time: &DateTime<Utc>) -> Option<i64> {
    let seconds = time.timestamp().checked_add(EPOCH_DIFFERENCE)?;
    let ticks = seconds.checked_mul(TICKS_PER_SECOND)?;
    ticks.checked_add((time.timestamp_subsec_nanos() / 100) as i64)
}

/**
 * NTDS stores UTC-Time and Generalized-Time as whole seconds since 1601.  
 * Multiplying by the tick rate gives a FILETIME
 */
pub(crate) fn ntds_seconds_to_datetime(seconds: i64) -> Option<DateTime<Utc>> {
    filetime_to_datetime(seconds.checked_mul(TICKS_PER_SECOND)?)
}

/// Convert a UTC datetime to NTDS seconds since 1601. Sub-second precision is dropped
pub(crate) fn datetime_to_ntds_seconds(time: &DateTime<Utc>) -> Option<i64> {
    Some(datetime_to_filetime(time)? / TICKS_PER_SECOND)
}

#[cfg(test)]
mod tests {
    use super::{
        datetime_to_filetime, datetime_to_ntds_seconds, filetime_to_datetime,
        ntds_seconds_to_datetime, time_now,
    };

    #[test]
    fn test_time_now() {
        assert!(time_now() > 1600000000);
    }

    #[test]
    fn test_filetime_to_datetime() {
        let result = filetime_to_datetime(132244766418940254).unwrap();
        assert_eq!(result.to_rfc3339(), "2020-01-26T01:44:01.894025400+00:00");
        assert_eq!(datetime_to_filetime(&result).unwrap(), 132244766418940254);
    }

    #[test]
    fn test_unix_epoch() {
        let result = filetime_to_datetime(116444736000000000).unwrap();
        assert_eq!(result.timestamp(), 0);
    }

    #[test]
    fn test_ntds_seconds_round_trip() {
        let seconds = 13224476641;
        let result = ntds_seconds_to_datetime(seconds).unwrap();
        assert_eq!(result.to_rfc3339(), "2020-01-26T01:44:01+00:00");
        assert_eq!(datetime_to_ntds_seconds(&result).unwrap(), seconds);
    }

    #[test]
    fn test_ntds_seconds_overflow() {
        assert!(ntds_seconds_to_datetime(i64::MAX).is_none());
    }
}
