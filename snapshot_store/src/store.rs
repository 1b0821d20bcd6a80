//! The snapshot store contract shared by every backend.
//!
//! A [`SnapshotStore`] holds per-symbol daily bar history and answers the
//! point and ranking queries the read API needs. Two implementations exist:
//! - [`crate::memory::MemoryStore`]: in-process, one `RwLock` around the whole history
//! - [`crate::sql::SqlStore`]: PostgreSQL or SQLite through diesel + an r2d2 pool
//!
//! Both backends honour the same [`LatestPolicy`], so switching backends never
//! changes which bars a ranking is computed from.
//!
//! Read operations never fail from the caller's point of view: backend errors
//! are logged and surface as an empty result. Only [`SnapshotStore::save_bars`]
//! reports errors.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_data_ingestor::models::bar::DailyBar;
use serde::{Deserialize, Serialize};

use crate::ranking::{IndexQuote, RankedBar};

/// Which bar counts as a symbol's "latest".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatestPolicy {
    /// Each symbol's own most recent bar, whatever its date.
    #[default]
    PerSymbol,
    /// Only bars dated at the most recent stored trading date across all
    /// symbols. A symbol that missed that session drops out of every read.
    Session,
}

/// Errors reported by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `save_bars` was called with nothing to save.
    #[error("refusing to save an empty batch")]
    EmptyBatch,

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// A statement failed.
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// No pooled connection became available in time.
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// The operation exceeded its per-operation deadline.
    #[error("{op} timed out after {after:?}")]
    Timeout {
        /// Operation name, for logs.
        op: &'static str,
        /// The deadline that was exceeded.
        after: Duration,
    },

    /// The blocking worker running the operation panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Capability contract of the market snapshot store.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Short backend name used in logs ("memory", "postgres", "sqlite").
    fn backend(&self) -> &'static str;

    /// Upserts `bars` keyed by (symbol, date) and advances the snapshot clock.
    ///
    /// Every record of the batch is applied before the clock moves, so a
    /// reader that observes the new [`SnapshotStore::last_updated`] also sees
    /// the bars. Returns the number of records applied.
    async fn save_bars(&self, bars: &[DailyBar]) -> Result<usize, StoreError>;

    /// One bar per symbol, chosen by the store's [`LatestPolicy`]. Unordered.
    async fn latest_bars(&self) -> Vec<DailyBar>;

    /// Latest bars with `change_pct > 0`, highest first, at most `limit`.
    async fn top_gainers(&self, limit: usize) -> Vec<RankedBar>;

    /// Latest bars with `change_pct < 0`, most negative first, at most `limit`.
    async fn top_losers(&self, limit: usize) -> Vec<RankedBar>;

    /// Latest bars by volume, highest first, at most `limit`.
    async fn most_active(&self, limit: usize) -> Vec<RankedBar>;

    /// The major index proxies that have data, in [`crate::ranking::INDEX_SYMBOLS`] order.
    async fn indices(&self) -> Vec<IndexQuote>;

    /// Time of the last successful `save_bars`, `None` before the first one.
    fn last_updated(&self) -> Option<DateTime<Utc>>;

    /// Releases backend resources. Safe to call more than once.
    async fn close(&self);
}
