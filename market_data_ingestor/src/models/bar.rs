//! Canonical representation of one trading day's OHLCV for one symbol.
//!
//! This struct is the standard output of every
//! [`MarketDataProvider`](crate::providers::MarketDataProvider) and the unit
//! stored by the snapshot store. `(symbol, date)` is its identity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single end-of-day bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// Ticker symbol, case-sensitive (e.g. "AAPL", "BRK.B").
    pub symbol: String,

    /// Opening price.
    pub open: f64,

    /// Highest traded price of the session.
    pub high: f64,

    /// Lowest traded price of the session.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Shares traded.
    pub volume: i64,

    /// Volume-weighted average price, `0.0` when the provider does not supply one.
    pub vwap: f64,

    /// Trading date (exchange calendar, no time of day).
    pub date: NaiveDate,

    /// `close - open`, filled in by [`DailyBar::apply_change`].
    pub change: f64,

    /// `change / open * 100`, filled in by [`DailyBar::apply_change`].
    pub change_pct: f64,
}

impl DailyBar {
    /// Computes `change` and `change_pct` from open and close.
    ///
    /// When `open` is not strictly positive both fields are set to zero; no
    /// alternate denominator is attempted.
    pub fn apply_change(&mut self) {
        if self.open > 0.0 {
            self.change = self.close - self.open;
            self.change_pct = self.change / self.open * 100.0;
        } else {
            self.change = 0.0;
            self.change_pct = 0.0;
        }
    }

    /// Builder-style variant of [`DailyBar::apply_change`].
    pub fn with_change(mut self) -> Self {
        self.apply_change();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, close: f64) -> DailyBar {
        DailyBar {
            symbol: "AAPL".into(),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 1_000,
            vwap: 0.0,
            date: NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
            change: 0.0,
            change_pct: 0.0,
        }
    }

    #[test]
    fn change_is_close_minus_open() {
        let b = bar(100.0, 105.0).with_change();
        assert_eq!(b.change, 5.0);
        assert!((b.change_pct - 5.0).abs() < 1e-9);
    }

    #[test]
    fn negative_move_gives_negative_pct() {
        let b = bar(50.0, 45.0).with_change();
        assert_eq!(b.change, -5.0);
        assert!((b.change_pct + 10.0).abs() < 1e-9);
    }

    #[test]
    fn zero_open_leaves_metrics_at_zero() {
        let b = bar(0.0, 12.0).with_change();
        assert_eq!(b.change, 0.0);
        assert_eq!(b.change_pct, 0.0);
        assert!(b.change_pct.is_finite());
    }

    #[test]
    fn stale_metrics_are_reset_when_open_is_zero() {
        let mut b = bar(0.0, 12.0);
        b.change = 3.0;
        b.change_pct = 42.0;
        b.apply_change();
        assert_eq!((b.change, b.change_pct), (0.0, 0.0));
    }

    #[test]
    fn serializes_with_snake_case_fields() {
        let json = serde_json::to_value(bar(10.0, 11.0).with_change()).unwrap();
        assert_eq!(json["symbol"], "AAPL");
        assert_eq!(json["date"], "2024-03-06");
        assert!(json.get("change_pct").is_some());
    }
}
