//! Read-only view over a store, shaped as the dashboard's JSON read models.
//!
//! The façade never writes. Every method returns a serde-serialisable value
//! that a transport can encode as-is.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ranking::{IndexQuote, RankedBar};
use crate::store::SnapshotStore;

/// Rows per list in [`QueryFacade::summary`].
pub const SUMMARY_LIMIT: usize = 10;

/// Rows returned by the standalone list queries.
pub const LIST_LIMIT: usize = 20;

/// Everything the dashboard's landing view needs in one payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    /// Index proxies with data.
    pub indices: Vec<IndexQuote>,
    /// Biggest percentage gainers.
    pub top_gainers: Vec<RankedBar>,
    /// Biggest percentage losers.
    pub top_losers: Vec<RankedBar>,
    /// Highest volume.
    pub most_active: Vec<RankedBar>,
    /// Freshness of the data; `None` until the first ingestion.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Liveness payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always `"ok"` when the process answers.
    pub status: String,
    /// Active store backend.
    pub backend: String,
    /// Freshness of the data.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Query entry point shared by request handlers.
#[derive(Clone)]
pub struct QueryFacade {
    store: Arc<dyn SnapshotStore>,
    summary_limit: usize,
}

impl QueryFacade {
    /// Façade over `store` with the default summary size.
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            summary_limit: SUMMARY_LIMIT,
        }
    }

    /// Overrides the number of rows per list in [`QueryFacade::summary`].
    pub fn with_summary_limit(mut self, limit: usize) -> Self {
        self.summary_limit = limit;
        self
    }

    /// Indices plus the three ranking lists.
    pub async fn summary(&self) -> MarketSummary {
        let n = self.summary_limit;
        let (indices, top_gainers, top_losers, most_active) = tokio::join!(
            self.store.indices(),
            self.store.top_gainers(n),
            self.store.top_losers(n),
            self.store.most_active(n),
        );
        MarketSummary {
            indices,
            top_gainers,
            top_losers,
            most_active,
            last_updated: self.store.last_updated(),
        }
    }

    /// Index proxies with data.
    pub async fn indices(&self) -> Vec<IndexQuote> {
        self.store.indices().await
    }

    /// Top gainers.
    pub async fn gainers(&self) -> Vec<RankedBar> {
        self.store.top_gainers(LIST_LIMIT).await
    }

    /// Top losers.
    pub async fn losers(&self) -> Vec<RankedBar> {
        self.store.top_losers(LIST_LIMIT).await
    }

    /// Most active by volume.
    pub async fn most_active(&self) -> Vec<RankedBar> {
        self.store.most_active(LIST_LIMIT).await
    }

    /// Liveness and freshness.
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".into(),
            backend: self.store.backend().into(),
            last_updated: self.store.last_updated(),
        }
    }
}
