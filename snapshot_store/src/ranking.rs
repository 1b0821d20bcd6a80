//! Read models derived from the latest bars, and the ranking rules both
//! backends must agree on.
//!
//! Ordering rules:
//! - gainers: `change_pct > 0`, descending
//! - losers: `change_pct < 0`, ascending (most negative first)
//! - most active: volume descending, no sign filter
//!
//! Ties are broken by symbol ascending. A `change_pct` of exactly zero is
//! neither a gainer nor a loser.

use std::cmp::Ordering;

use market_data_ingestor::models::bar::DailyBar;
use serde::{Deserialize, Serialize};

/// The index proxies reported by [`crate::SnapshotStore::indices`], in display order.
pub const INDEX_SYMBOLS: [(&str, &str); 4] = [
    ("SPY", "S&P 500"),
    ("QQQ", "Nasdaq 100"),
    ("DIA", "Dow Jones"),
    ("IWM", "Russell 2000"),
];

/// Display name of an index proxy symbol.
pub fn index_name(symbol: &str) -> Option<&'static str> {
    INDEX_SYMBOLS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, name)| *name)
}

/// One row of a top-N list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedBar {
    /// Ticker symbol.
    pub symbol: String,
    /// Latest close.
    pub price: f64,
    /// `close - open` of the latest bar.
    pub change: f64,
    /// Percent change of the latest bar.
    pub change_pct: f64,
    /// Shares traded in the latest bar.
    pub volume: i64,
}

impl From<&DailyBar> for RankedBar {
    fn from(bar: &DailyBar) -> Self {
        Self {
            symbol: bar.symbol.clone(),
            price: bar.close,
            change: bar.change,
            change_pct: bar.change_pct,
            volume: bar.volume,
        }
    }
}

/// Snapshot of one major index proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQuote {
    /// Proxy ETF symbol.
    pub symbol: String,
    /// Display name of the index.
    pub name: String,
    /// Latest close of the proxy.
    pub price: f64,
    /// `close - open`.
    pub change: f64,
    /// Percent change.
    pub change_pct: f64,
}

impl IndexQuote {
    /// Builds the quote for `bar` if its symbol is one of [`INDEX_SYMBOLS`].
    pub fn from_bar(bar: &DailyBar) -> Option<Self> {
        index_name(&bar.symbol).map(|name| Self {
            symbol: bar.symbol.clone(),
            name: name.to_string(),
            price: bar.close,
            change: bar.change,
            change_pct: bar.change_pct,
        })
    }
}

fn by_symbol(a: &DailyBar, b: &DailyBar) -> Ordering {
    a.symbol.cmp(&b.symbol)
}

fn rank<'a, F, K>(
    bars: impl IntoIterator<Item = &'a DailyBar>,
    keep: F,
    cmp: K,
    limit: usize,
) -> Vec<RankedBar>
where
    F: Fn(&DailyBar) -> bool,
    K: Fn(&DailyBar, &DailyBar) -> Ordering,
{
    let mut picked: Vec<&DailyBar> = bars.into_iter().filter(|b| keep(*b)).collect();
    picked.sort_by(|a, b| cmp(*a, *b).then_with(|| by_symbol(a, b)));
    picked.truncate(limit);
    picked.into_iter().map(RankedBar::from).collect()
}

/// Top `limit` gainers among `bars`.
pub fn top_gainers<'a>(
    bars: impl IntoIterator<Item = &'a DailyBar>,
    limit: usize,
) -> Vec<RankedBar> {
    rank(
        bars,
        |b| b.change_pct > 0.0,
        |a, b| b.change_pct.total_cmp(&a.change_pct),
        limit,
    )
}

/// Top `limit` losers among `bars`.
pub fn top_losers<'a>(
    bars: impl IntoIterator<Item = &'a DailyBar>,
    limit: usize,
) -> Vec<RankedBar> {
    rank(
        bars,
        |b| b.change_pct < 0.0,
        |a, b| a.change_pct.total_cmp(&b.change_pct),
        limit,
    )
}

/// Top `limit` symbols by volume among `bars`.
pub fn most_active<'a>(
    bars: impl IntoIterator<Item = &'a DailyBar>,
    limit: usize,
) -> Vec<RankedBar> {
    rank(bars, |_| true, |a, b| b.volume.cmp(&a.volume), limit)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use proptest::prelude::*;

    use super::*;

    fn bar(symbol: &str, change_pct: f64, volume: i64) -> DailyBar {
        DailyBar {
            symbol: symbol.into(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 100.0 + change_pct,
            volume,
            vwap: 100.0,
            date: NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
            change: change_pct,
            change_pct,
        }
    }

    #[test]
    fn gainers_sorted_descending_and_capped() {
        let bars = [bar("A", 1.0, 10), bar("B", 5.0, 10), bar("C", -2.0, 10), bar("D", 3.0, 10)];
        let got: Vec<_> = top_gainers(&bars, 2).into_iter().map(|r| r.symbol).collect();
        assert_eq!(got, ["B", "D"]);
    }

    #[test]
    fn losers_most_negative_first() {
        let bars = [bar("A", -1.0, 10), bar("B", 5.0, 10), bar("C", -7.5, 10)];
        let got: Vec<_> = top_losers(&bars, 10).into_iter().map(|r| r.symbol).collect();
        assert_eq!(got, ["C", "A"]);
    }

    #[test]
    fn zero_change_is_neither_gainer_nor_loser() {
        let bars = [bar("FLAT", 0.0, 10)];
        assert!(top_gainers(&bars, 10).is_empty());
        assert!(top_losers(&bars, 10).is_empty());
        assert_eq!(most_active(&bars, 10).len(), 1);
    }

    #[test]
    fn ties_break_by_symbol() {
        let bars = [bar("ZZ", 2.0, 5), bar("AA", 2.0, 5), bar("MM", 2.0, 5)];
        let got: Vec<_> = top_gainers(&bars, 3).into_iter().map(|r| r.symbol).collect();
        assert_eq!(got, ["AA", "MM", "ZZ"]);
        let got: Vec<_> = most_active(&bars, 3).into_iter().map(|r| r.symbol).collect();
        assert_eq!(got, ["AA", "MM", "ZZ"]);
    }

    #[test]
    fn most_active_ignores_sign() {
        let bars = [bar("A", -3.0, 500), bar("B", 1.0, 50), bar("C", 0.0, 5_000)];
        let got: Vec<_> = most_active(&bars, 2).into_iter().map(|r| r.symbol).collect();
        assert_eq!(got, ["C", "A"]);
    }

    #[test]
    fn zero_limit_is_empty() {
        let bars = [bar("A", 1.0, 1)];
        assert!(top_gainers(&bars, 0).is_empty());
    }

    #[test]
    fn ranked_bar_price_is_close() {
        let r = RankedBar::from(&bar("A", 2.5, 7));
        assert_eq!(r.price, 102.5);
        assert_eq!(r.volume, 7);
    }

    #[test]
    fn only_configured_symbols_become_index_quotes() {
        assert_eq!(IndexQuote::from_bar(&bar("SPY", 1.0, 1)).unwrap().name, "S&P 500");
        assert!(IndexQuote::from_bar(&bar("spy", 1.0, 1)).is_none());
        assert!(IndexQuote::from_bar(&bar("AAPL", 1.0, 1)).is_none());
    }

    fn arb_bars() -> impl Strategy<Value = Vec<DailyBar>> {
        prop::collection::vec((-20i32..20, 0i64..1_000), 0..40).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (pct, vol))| bar(&format!("S{i:03}"), pct as f64 / 2.0, vol))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn gainers_and_losers_are_disjoint(bars in arb_bars(), n in 0usize..50) {
            let gainers: Vec<_> = top_gainers(&bars, n).into_iter().map(|r| r.symbol).collect();
            let losers: Vec<_> = top_losers(&bars, n).into_iter().map(|r| r.symbol).collect();
            prop_assert!(gainers.iter().all(|g| !losers.contains(g)));
        }

        #[test]
        fn large_limit_returns_every_qualifier_sorted(bars in arb_bars()) {
            let qualifying = bars.iter().filter(|b| b.change_pct > 0.0).count();
            let got = top_gainers(&bars, qualifying + 5);
            prop_assert_eq!(got.len(), qualifying);
            prop_assert!(got.windows(2).all(|w| w[0].change_pct >= w[1].change_pct));
        }
    }
}
