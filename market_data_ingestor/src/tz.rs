//! Exchange time zone helpers.
//!
//! US equity sessions are defined in New York wall-clock time, so every
//! "which trading day is this?" question is answered in [`MARKET_TZ`].

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;

/// Time zone of the US equity exchanges.
pub const MARKET_TZ: Tz = chrono_tz::America::New_York;

/// Converts a Unix timestamp in milliseconds to the exchange calendar date.
///
/// Returns `None` when the timestamp is out of chrono's representable range.
pub fn market_date_from_millis(millis: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.with_timezone(&MARKET_TZ).date_naive())
}
