//! In-process backend.
//!
//! The whole history lives behind one `RwLock`: a batch is applied and the
//! clock advanced under a single write lock, and every read computes its
//! answer under a single read lock, so a reader sees a batch either fully or
//! not at all. Nothing is ever evicted.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use market_data_ingestor::models::bar::DailyBar;
use tracing::debug;

use crate::ranking::{self, INDEX_SYMBOLS, IndexQuote, RankedBar};
use crate::store::{LatestPolicy, SnapshotStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    bars: HashMap<String, BTreeMap<NaiveDate, DailyBar>>,
    max_date: Option<NaiveDate>,
    last_updated: Option<DateTime<Utc>>,
}

impl Inner {
    fn latest(&self, policy: LatestPolicy) -> Vec<&DailyBar> {
        match policy {
            LatestPolicy::PerSymbol => self
                .bars
                .values()
                .filter_map(|history| history.values().next_back())
                .collect(),
            LatestPolicy::Session => match self.max_date {
                Some(date) => self
                    .bars
                    .values()
                    .filter_map(|history| history.get(&date))
                    .collect(),
                None => Vec::new(),
            },
        }
    }
}

/// [`SnapshotStore`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    policy: LatestPolicy,
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Empty store resolving "latest" with `policy`.
    pub fn new(policy: LatestPolicy) -> Self {
        Self {
            policy,
            inner: RwLock::default(),
        }
    }

    /// Number of (symbol, date) records held.
    pub fn len(&self) -> usize {
        self.read().bars.values().map(BTreeMap::len).sum()
    }

    /// `true` before the first successful save.
    pub fn is_empty(&self) -> bool {
        self.read().bars.is_empty()
    }

    // A writer that panicked mid-batch cannot leave a half-applied clock behind
    // (the clock moves last), so the data is still usable.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_latest<T>(&self, f: impl FnOnce(Vec<&DailyBar>) -> T) -> T {
        let inner = self.read();
        f(inner.latest(self.policy))
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn save_bars(&self, bars: &[DailyBar]) -> Result<usize, StoreError> {
        if bars.is_empty() {
            return Err(StoreError::EmptyBatch);
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        for bar in bars {
            inner
                .bars
                .entry(bar.symbol.clone())
                .or_default()
                .insert(bar.date, bar.clone());
            if inner.max_date.is_none_or(|d| bar.date > d) {
                inner.max_date = Some(bar.date);
            }
        }
        inner.last_updated = Some(Utc::now());
        debug!(count = bars.len(), symbols = inner.bars.len(), "memory store saved batch");

        Ok(bars.len())
    }

    async fn latest_bars(&self) -> Vec<DailyBar> {
        self.with_latest(|bars| bars.into_iter().cloned().collect())
    }

    async fn top_gainers(&self, limit: usize) -> Vec<RankedBar> {
        self.with_latest(|bars| ranking::top_gainers(bars, limit))
    }

    async fn top_losers(&self, limit: usize) -> Vec<RankedBar> {
        self.with_latest(|bars| ranking::top_losers(bars, limit))
    }

    async fn most_active(&self, limit: usize) -> Vec<RankedBar> {
        self.with_latest(|bars| ranking::most_active(bars, limit))
    }

    async fn indices(&self) -> Vec<IndexQuote> {
        self.with_latest(|bars| {
            INDEX_SYMBOLS
                .iter()
                .filter_map(|(symbol, _)| bars.iter().find(|b| b.symbol == *symbol))
                .filter_map(|bar| IndexQuote::from_bar(bar))
                .collect()
        })
    }

    fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.read().last_updated
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(symbol: &str, day: u32, open: f64, close: f64) -> DailyBar {
        DailyBar {
            symbol: symbol.into(),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 100,
            vwap: 0.0,
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            change: 0.0,
            change_pct: 0.0,
        }
        .with_change()
    }

    #[tokio::test]
    async fn per_symbol_keeps_stale_symbols() {
        let store = MemoryStore::new(LatestPolicy::PerSymbol);
        store.save_bars(&[bar("OLD", 5, 10.0, 11.0)]).await.unwrap();
        store.save_bars(&[bar("NEW", 6, 10.0, 12.0)]).await.unwrap();

        let mut symbols: Vec<_> = store.latest_bars().await.into_iter().map(|b| b.symbol).collect();
        symbols.sort();
        assert_eq!(symbols, ["NEW", "OLD"]);
    }

    #[tokio::test]
    async fn session_drops_symbols_missing_the_last_date() {
        let store = MemoryStore::new(LatestPolicy::Session);
        store
            .save_bars(&[bar("OLD", 5, 10.0, 11.0), bar("NEW", 5, 10.0, 9.0)])
            .await
            .unwrap();
        store.save_bars(&[bar("NEW", 6, 10.0, 12.0)]).await.unwrap();

        let latest = store.latest_bars().await;
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].date, NaiveDate::from_ymd_opt(2024, 3, 6).unwrap());
        assert!(store.top_gainers(10).await.iter().all(|r| r.symbol == "NEW"));
    }

    #[tokio::test]
    async fn older_backfill_does_not_replace_latest() {
        let store = MemoryStore::new(LatestPolicy::PerSymbol);
        store.save_bars(&[bar("AAPL", 6, 10.0, 12.0)]).await.unwrap();
        store.save_bars(&[bar("AAPL", 4, 10.0, 5.0)]).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.latest_bars().await[0].close, 12.0);
    }

    #[tokio::test]
    async fn empty_batch_leaves_clock_alone() {
        let store = MemoryStore::default();
        assert!(matches!(store.save_bars(&[]).await, Err(StoreError::EmptyBatch)));
        assert!(store.last_updated().is_none());
        assert!(store.is_empty());
    }
}
