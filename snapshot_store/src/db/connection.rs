//! Database targets and pooled connections.
//!
//! [`DatabaseTarget::parse`] decides the backend from the URL:
//! - `postgres://…` / `postgresql://…` → PostgreSQL
//! - `sqlite:…`, `sqlite://…`, a bare file path, or `:memory:` → SQLite
//!
//! SQLite connections get WAL journaling, foreign_keys=ON and a 5000ms
//! busy_timeout, both when opened directly with [`connect_sqlite`] and on
//! every pooled connection through [`SqlitePragmas`].
//!
//! Example:
//! ```no_run
//! use snapshot_store::db::connection::{DatabaseTarget, PoolSettings, build_pool};
//!
//! let target = DatabaseTarget::parse("sqlite:///tmp/market.db");
//! let pool = build_pool(&target, &PoolSettings::default()).expect("pool");
//! assert_eq!(pool.backend(), "sqlite");
//! ```

use std::time::Duration;

use anyhow::Context;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::{Connection, PgConnection, SqliteConnection};
use tracing::{debug, info};

const SQLITE_PRAGMAS: &str =
    "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;";

/// Where the store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// A PostgreSQL connection URL, passed to libpq unchanged.
    Postgres(String),
    /// A SQLite database path (scheme stripped) or `:memory:`.
    Sqlite(String),
}

impl DatabaseTarget {
    /// Classifies `url`; anything that is not a PostgreSQL URL is treated as SQLite.
    pub fn parse(url: &str) -> Self {
        let url = url.trim();
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Self::Postgres(url.to_string());
        }
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        Self::Sqlite(path.to_string())
    }

    /// Backend name used in logs.
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Sqlite(_) => "sqlite",
        }
    }

    fn is_in_memory(&self) -> bool {
        matches!(self, Self::Sqlite(path) if path == ":memory:" || path.contains("mode=memory"))
    }
}

/// r2d2 pool sizing and lifetimes.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSettings {
    /// Upper bound on open connections.
    pub max_size: u32,
    /// Connections kept open while idle.
    pub min_idle: Option<u32>,
    /// Connections older than this are recycled.
    pub max_lifetime: Option<Duration>,
    /// Idle connections above `min_idle` are closed after this long.
    pub idle_timeout: Option<Duration>,
    /// How long `get()` waits for a free connection before failing.
    pub connection_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: Some(2),
            max_lifetime: Some(Duration::from_secs(60 * 60)),
            idle_timeout: Some(Duration::from_secs(30 * 60)),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

/// Applies the SQLite PRAGMAs to every connection the pool opens.
#[derive(Debug, Clone, Copy)]
pub struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(SQLITE_PRAGMAS)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// A connection pool for one of the supported backends.
#[derive(Clone)]
pub enum DbPool {
    /// PostgreSQL pool.
    Postgres(Pool<ConnectionManager<PgConnection>>),
    /// SQLite pool.
    Sqlite(Pool<ConnectionManager<SqliteConnection>>),
}

impl DbPool {
    /// Backend name used in logs.
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

impl std::fmt::Debug for DbPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            Self::Postgres(p) => p.state(),
            Self::Sqlite(p) => p.state(),
        };
        f.debug_struct("DbPool")
            .field("backend", &self.backend())
            .field("connections", &state.connections)
            .field("idle", &state.idle_connections)
            .finish()
    }
}

/// Builds a pool for `target` and opens its initial connections.
///
/// Fails if the database cannot be reached within
/// [`PoolSettings::connection_timeout`]. An in-memory SQLite database lives
/// only as long as its connection, so it always gets exactly one connection
/// that is never recycled.
pub fn build_pool(target: &DatabaseTarget, settings: &PoolSettings) -> anyhow::Result<DbPool> {
    let pool = match target {
        DatabaseTarget::Postgres(url) => {
            let pool = Pool::builder()
                .max_size(settings.max_size)
                .min_idle(settings.min_idle)
                .max_lifetime(settings.max_lifetime)
                .idle_timeout(settings.idle_timeout)
                .connection_timeout(settings.connection_timeout)
                .build(ConnectionManager::<PgConnection>::new(url.as_str()))
                .context("building postgres pool")?;
            DbPool::Postgres(pool)
        }
        DatabaseTarget::Sqlite(path) => {
            let builder = Pool::builder()
                .connection_customizer(Box::new(SqlitePragmas))
                .connection_timeout(settings.connection_timeout);
            let builder = if target.is_in_memory() {
                builder
                    .max_size(1)
                    .min_idle(None)
                    .max_lifetime(None)
                    .idle_timeout(None)
            } else {
                builder
                    .max_size(settings.max_size)
                    .min_idle(settings.min_idle)
                    .max_lifetime(settings.max_lifetime)
                    .idle_timeout(settings.idle_timeout)
            };
            let pool = builder
                .build(ConnectionManager::<SqliteConnection>::new(path.as_str()))
                .with_context(|| format!("building sqlite pool for {path}"))?;
            DbPool::Sqlite(pool)
        }
    };
    info!(backend = pool.backend(), "database pool ready");
    Ok(pool)
}

/// Open a single SQLite connection and apply connection-wide PRAGMAs.
pub fn connect_sqlite(path: &str) -> anyhow::Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(path)
        .with_context(|| format!("opening sqlite database {path}"))?;
    conn.batch_execute(SQLITE_PRAGMAS)?;
    debug!(path, "sqlite connection opened");
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use diesel::{QueryableByName, RunQueryDsl, sql_query, sql_types::Text};

    use super::*;

    #[test]
    fn postgres_urls_are_recognised() {
        for url in ["postgres://u@h/db", "postgresql://u@h/db"] {
            assert_eq!(DatabaseTarget::parse(url), DatabaseTarget::Postgres(url.into()));
        }
    }

    #[test]
    fn sqlite_scheme_is_stripped() {
        assert_eq!(
            DatabaseTarget::parse("sqlite:///var/lib/market.db"),
            DatabaseTarget::Sqlite("/var/lib/market.db".into())
        );
        assert_eq!(
            DatabaseTarget::parse("sqlite:market.db"),
            DatabaseTarget::Sqlite("market.db".into())
        );
        assert_eq!(
            DatabaseTarget::parse("./data/market.db"),
            DatabaseTarget::Sqlite("./data/market.db".into())
        );
        assert!(DatabaseTarget::parse(":memory:").is_in_memory());
    }

    #[derive(QueryableByName)]
    struct JournalMode {
        #[diesel(sql_type = Text)]
        journal_mode: String,
    }

    #[test]
    fn pooled_sqlite_connections_use_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.db");
        let target = DatabaseTarget::parse(path.to_str().unwrap());

        let DbPool::Sqlite(pool) = build_pool(&target, &PoolSettings::default()).unwrap() else {
            panic!("expected a sqlite pool");
        };
        let mut conn = pool.get().unwrap();
        let mode: JournalMode = sql_query("PRAGMA journal_mode;").get_result(&mut *conn).unwrap();
        assert_eq!(mode.journal_mode.to_lowercase(), "wal");
    }

    #[test]
    fn in_memory_pool_holds_one_connection() {
        let pool = build_pool(&DatabaseTarget::parse(":memory:"), &PoolSettings::default()).unwrap();
        let DbPool::Sqlite(pool) = pool else {
            panic!("expected a sqlite pool");
        };
        assert_eq!(pool.max_size(), 1);
    }
}
