//! One ingestion cycle: fetch a day of grouped bars, derive change metrics,
//! write the batch.
//!
//! A cycle never retries and never panics. Whatever happens is reported as a
//! [`CycleOutcome`] or a [`CycleError`] and logged; a failure leaves the store
//! exactly as it was and does not affect later cycles.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use market_data_ingestor::models::bar::DailyBar;
use market_data_ingestor::providers::{MarketDataProvider, ProviderError};
use snapshot_store::{SnapshotStore, StoreError};
use tracing::{error, info, warn};

use crate::trading_day::current_trading_day;

/// Default upper bound on the provider fetch of one cycle.
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// What a completed cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The batch for `date` was written.
    Saved {
        /// Trading day that was ingested.
        date: NaiveDate,
        /// Records written.
        rows: usize,
    },
    /// The provider had no bars for `date` (holiday, not yet published).
    NoData {
        /// Trading day that was requested.
        date: NaiveDate,
    },
}

/// Why a cycle did not complete.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// The provider call failed; nothing was written.
    #[error("fetching bars for {date} failed: {source}")]
    Fetch {
        /// Trading day that was requested.
        date: NaiveDate,
        /// Provider failure.
        #[source]
        source: ProviderError,
    },

    /// The batch could not be written; previously stored data is unchanged.
    #[error("saving bars for {date} failed: {source}")]
    Store {
        /// Trading day that was being written.
        date: NaiveDate,
        /// Store failure.
        #[source]
        source: StoreError,
    },

    /// The fetch did not finish within the cycle deadline; nothing was written.
    #[error("fetching bars for {date} timed out after {after:?}")]
    TimedOut {
        /// Trading day that was requested.
        date: NaiveDate,
        /// The deadline that was exceeded.
        after: Duration,
    },
}

impl CycleError {
    /// Trading day the failed cycle targeted.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Fetch { date, .. } | Self::Store { date, .. } | Self::TimedOut { date, .. } => *date,
        }
    }
}

/// Runs ingestion cycles against one provider and one store.
#[derive(Clone)]
pub struct Ingestor {
    provider: Arc<dyn MarketDataProvider>,
    store: Arc<dyn SnapshotStore>,
    timeout: Duration,
}

impl Ingestor {
    /// Ingestor with the default cycle timeout.
    pub fn new(provider: Arc<dyn MarketDataProvider>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            provider,
            store,
            timeout: DEFAULT_CYCLE_TIMEOUT,
        }
    }

    /// Overrides the fetch deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The store cycles write to.
    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Ingests the trading day selected for the current time.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        self.run_cycle_for(current_trading_day()).await
    }

    /// Ingests `date` and logs the result.
    ///
    /// Only the fetch is bounded by the cycle timeout. Once the batch is handed
    /// to the store the cycle waits for the store's answer, which is bounded
    /// by the store's own write deadline.
    pub async fn run_cycle_for(&self, date: NaiveDate) -> Result<CycleOutcome, CycleError> {
        let result = self.ingest(date).await;

        match &result {
            Ok(CycleOutcome::Saved { date, rows }) => {
                info!(%date, count = rows, backend = self.store.backend(), "ingestion cycle complete")
            }
            Ok(CycleOutcome::NoData { date }) => {
                warn!(%date, "provider returned no bars, market likely closed")
            }
            Err(e) => error!(date = %e.date(), error = %e, "ingestion cycle failed"),
        }
        result
    }

    async fn ingest(&self, date: NaiveDate) -> Result<CycleOutcome, CycleError> {
        info!(%date, "fetching grouped daily bars");
        let after = self.timeout;
        let mut bars = tokio::time::timeout(after, self.provider.grouped_daily(date))
            .await
            .map_err(|_| CycleError::TimedOut { date, after })?
            .map_err(|source| CycleError::Fetch { date, source })?;

        if bars.is_empty() {
            return Ok(CycleOutcome::NoData { date });
        }
        bars.iter_mut().for_each(DailyBar::apply_change);

        let rows = self
            .store
            .save_bars(&bars)
            .await
            .map_err(|source| CycleError::Store { date, source })?;
        Ok(CycleOutcome::Saved { date, rows })
    }
}
