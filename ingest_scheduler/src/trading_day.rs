//! Which trading day an ingestion run should fetch.
//!
//! The provider publishes a session's grouped bars some time after the close,
//! so a run always targets a session that is safely in the past:
//! 1. take `now` in the exchange time zone
//! 2. before 16:30 local, step back one day
//! 3. step back one more day
//! 4. step back over Saturday and Sunday
//!
//! Exchange holidays are not known here; a holiday target simply yields an
//! empty provider response.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use market_data_ingestor::tz::MARKET_TZ;

/// Local time after which the current session counts as published.
pub const CUTOFF: (u32, u32) = (16, 30);

/// Target trading day for a run at `now`.
pub fn trading_day_for<Z: TimeZone>(now: &DateTime<Z>) -> NaiveDate {
    let local = now.with_timezone(&MARKET_TZ);
    let mut date = local.date_naive();

    if (local.hour(), local.minute()) < CUTOFF {
        date = date - Days::new(1);
    }
    date = date - Days::new(1);
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date = date - Days::new(1);
    }
    date
}

/// Target trading day for a run right now.
pub fn current_trading_day() -> NaiveDate {
    trading_day_for(&Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ny(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<chrono_tz::Tz> {
        MARKET_TZ.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn friday_afternoon_before_cutoff_targets_wednesday() {
        assert_eq!(trading_day_for(&ny(2024, 3, 8, 15, 0)), date(2024, 3, 6));
    }

    #[test]
    fn monday_evening_targets_previous_friday() {
        assert_eq!(trading_day_for(&ny(2024, 3, 11, 17, 0)), date(2024, 3, 8));
    }

    #[test]
    fn cutoff_minute_counts_as_after() {
        assert_eq!(trading_day_for(&ny(2024, 3, 12, 16, 30)), date(2024, 3, 11));
        assert_eq!(trading_day_for(&ny(2024, 3, 12, 16, 29)), date(2024, 3, 8));
    }

    #[test]
    fn weekends_resolve_to_a_weekday() {
        assert_eq!(trading_day_for(&ny(2024, 3, 9, 12, 0)), date(2024, 3, 7));
        assert_eq!(trading_day_for(&ny(2024, 3, 10, 10, 0)), date(2024, 3, 8));
        assert_eq!(trading_day_for(&ny(2024, 3, 10, 18, 0)), date(2024, 3, 8));
    }

    #[test]
    fn utc_input_is_converted_to_exchange_time() {
        // 21:00Z is 16:00 EST, still before the cutoff.
        let before = Utc.with_ymd_and_hms(2024, 3, 8, 21, 0, 0).unwrap();
        assert_eq!(trading_day_for(&before), date(2024, 3, 6));
        // 20:45Z is 16:45 EDT after the March DST switch.
        let after = Utc.with_ymd_and_hms(2024, 3, 11, 20, 45, 0).unwrap();
        assert_eq!(trading_day_for(&after), date(2024, 3, 8));
    }

    #[test]
    fn result_is_never_a_weekend() {
        let start = ny(2024, 1, 1, 0, 0);
        for hours in (0..24 * 21).step_by(5) {
            let now = start + chrono::Duration::hours(hours);
            let day = trading_day_for(&now);
            assert!(!matches!(day.weekday(), Weekday::Sat | Weekday::Sun), "{now}");
            assert!(day < now.date_naive(), "{now}");
        }
    }
}
