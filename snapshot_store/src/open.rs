//! Backend selection.

use std::sync::Arc;

use tracing::{info, warn};

use crate::db::connection::PoolSettings;
use crate::memory::MemoryStore;
use crate::sql::{OpTimeouts, SqlStore};
use crate::store::{LatestPolicy, SnapshotStore};

/// Everything needed to open a store.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// SQL database URL; `None` (or blank) selects the in-memory backend.
    pub database_url: Option<String>,
    /// How "latest" is resolved on reads.
    pub policy: LatestPolicy,
    /// Pool settings for the SQL backend.
    pub pool: PoolSettings,
    /// Per-operation deadlines for the SQL backend.
    pub timeouts: OpTimeouts,
}

/// Opens the configured backend.
///
/// When a database URL is configured but the database cannot be opened, the
/// failure is logged and the in-memory backend is returned instead, so the
/// process can still ingest and serve the current session.
pub async fn open_store(options: &StoreOptions) -> Arc<dyn SnapshotStore> {
    let url = options
        .database_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty());

    let Some(url) = url else {
        info!(policy = ?options.policy, "no database configured, using memory store");
        return Arc::new(MemoryStore::new(options.policy));
    };

    match SqlStore::connect(url, options.policy, &options.pool, options.timeouts).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "sql store unavailable, falling back to memory store");
            Arc::new(MemoryStore::new(options.policy))
        }
    }
}
