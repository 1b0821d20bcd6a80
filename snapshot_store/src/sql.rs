//! Relational backend over PostgreSQL or SQLite.
//!
//! Reads are pushed down to the database as set queries: the "latest" view
//! for the configured [`LatestPolicy`] is a subquery, and filtering, ordering
//! and `LIMIT` run on top of it. A batch is written in one transaction, so a
//! failing record rolls the whole batch back and readers never observe a
//! partial batch.
//!
//! Diesel is synchronous; every operation runs on the blocking thread pool
//! and is bounded by a deadline from [`OpTimeouts`]. Reads are abandoned at
//! their deadline. A write checks its deadline inside the transaction and
//! rolls back, so [`StoreError::Timeout`] from `save_bars` means nothing was
//! written.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use diesel::dsl::max;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::upsert::excluded;
use indexmap::IndexMap;
use market_data_ingestor::models::bar::DailyBar;
use tracing::{debug, error, info};

use crate::db::connection::{DatabaseTarget, DbPool, PoolSettings, build_pool};
use crate::db::migrate;
use crate::models::{BarRow, NewDailyBar};
use crate::ranking::{INDEX_SYMBOLS, IndexQuote, RankedBar};
use crate::schema::daily_bars;
use crate::store::{LatestPolicy, SnapshotStore, StoreError};

/// Rows per multi-row `INSERT`; 11 binds each keeps well under PostgreSQL's 65535 limit.
const INSERT_CHUNK: usize = 1_000;

const COLUMNS: &str =
    "b.symbol, b.date, b.open, b.high, b.low, b.close, b.volume, b.vwap, b.change, b.change_percent";

/// Per-operation deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpTimeouts {
    /// Deadline for each read query.
    pub read: Duration,
    /// Deadline for one `save_bars` transaction.
    pub write: Duration,
}

impl Default for OpTimeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(10),
            write: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Ranking {
    Gainers,
    Losers,
    MostActive,
}

impl Ranking {
    fn clause(self) -> &'static str {
        match self {
            Ranking::Gainers => "WHERE l.change_percent > 0 ORDER BY l.change_percent DESC",
            Ranking::Losers => "WHERE l.change_percent < 0 ORDER BY l.change_percent ASC",
            Ranking::MostActive => "ORDER BY l.volume DESC",
        }
    }

    fn op(self) -> &'static str {
        match self {
            Ranking::Gainers => "top_gainers",
            Ranking::Losers => "top_losers",
            Ranking::MostActive => "most_active",
        }
    }
}

fn latest_view(policy: LatestPolicy) -> String {
    match policy {
        LatestPolicy::PerSymbol => format!(
            "SELECT {COLUMNS} FROM daily_bars b \
             JOIN (SELECT symbol, MAX(date) AS max_date FROM daily_bars GROUP BY symbol) m \
             ON b.symbol = m.symbol AND b.date = m.max_date"
        ),
        LatestPolicy::Session => format!(
            "SELECT {COLUMNS} FROM daily_bars b \
             WHERE b.date = (SELECT MAX(date) FROM daily_bars)"
        ),
    }
}

// Tie-breaks must match `String::cmp`, i.e. byte order.
fn symbol_order(pool: &DbPool) -> &'static str {
    match pool {
        DbPool::Postgres(_) => "l.symbol COLLATE \"C\" ASC",
        DbPool::Sqlite(_) => "l.symbol ASC",
    }
}

fn ranking_sql(pool: &DbPool, policy: LatestPolicy, ranking: Ranking, limit: usize) -> String {
    let limit = limit.min(i64::MAX as usize);
    format!(
        "SELECT * FROM ({view}) l {clause}, {tiebreak} LIMIT {limit}",
        view = latest_view(policy),
        clause = ranking.clause(),
        tiebreak = symbol_order(pool),
    )
}

fn indices_sql(policy: LatestPolicy) -> String {
    let symbols = INDEX_SYMBOLS
        .iter()
        .map(|(symbol, _)| format!("'{symbol}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT * FROM ({view}) l WHERE l.symbol IN ({symbols})",
        view = latest_view(policy)
    )
}

fn load_bars(pool: &DbPool, sql: &str) -> Result<Vec<DailyBar>, StoreError> {
    let rows: Vec<BarRow> = match pool {
        DbPool::Postgres(p) => {
            let mut pooled = p.get()?;
            let conn: &mut PgConnection = &mut pooled;
            sql_query(sql).load(conn)?
        }
        DbPool::Sqlite(p) => {
            let mut pooled = p.get()?;
            let conn: &mut SqliteConnection = &mut pooled;
            sql_query(sql).load(conn)?
        }
    };
    Ok(rows.into_iter().map(DailyBar::from).collect())
}

fn max_updated_at(pool: &DbPool) -> Result<Option<NaiveDateTime>, StoreError> {
    let query = daily_bars::table.select(max(daily_bars::updated_at));
    let stamp = match pool {
        DbPool::Postgres(p) => {
            let mut pooled = p.get()?;
            let conn: &mut PgConnection = &mut pooled;
            query.get_result::<Option<NaiveDateTime>>(conn)?
        }
        DbPool::Sqlite(p) => {
            let mut pooled = p.get()?;
            let conn: &mut SqliteConnection = &mut pooled;
            query.get_result::<Option<NaiveDateTime>>(conn)?
        }
    };
    Ok(stamp)
}

macro_rules! upsert {
    ($conn:expr, $values:expr) => {
        diesel::insert_into(daily_bars::table)
            .values($values)
            .on_conflict((daily_bars::symbol, daily_bars::date))
            .do_update()
            .set((
                daily_bars::open.eq(excluded(daily_bars::open)),
                daily_bars::high.eq(excluded(daily_bars::high)),
                daily_bars::low.eq(excluded(daily_bars::low)),
                daily_bars::close.eq(excluded(daily_bars::close)),
                daily_bars::volume.eq(excluded(daily_bars::volume)),
                daily_bars::vwap.eq(excluded(daily_bars::vwap)),
                daily_bars::change.eq(excluded(daily_bars::change)),
                daily_bars::change_percent.eq(excluded(daily_bars::change_percent)),
                daily_bars::updated_at.eq(excluded(daily_bars::updated_at)),
            ))
            .execute($conn)
    };
}

/// Upserts `bars` in one transaction that checks `deadline` between
/// statements. Past the deadline the transaction rolls back and the call
/// returns [`StoreError::Timeout`], so an error never leaves rows behind.
fn write_batch(
    pool: &DbPool,
    bars: &[DailyBar],
    stamp: NaiveDateTime,
    deadline: Instant,
    after: Duration,
) -> Result<usize, StoreError> {
    let expired = || StoreError::Timeout { op: "save_bars", after };
    let check = || if Instant::now() >= deadline { Err(expired()) } else { Ok(()) };

    // PostgreSQL rejects a multi-row upsert that touches the same key twice;
    // the last record for a key wins, as it would with sequential writes.
    let mut unique: IndexMap<(&str, chrono::NaiveDate), &DailyBar> = IndexMap::with_capacity(bars.len());
    for bar in bars {
        unique.insert((bar.symbol.as_str(), bar.date), bar);
    }
    let rows: Vec<NewDailyBar<'_>> = unique
        .values()
        .map(|bar| NewDailyBar::from_bar(bar, stamp))
        .collect();

    match pool {
        DbPool::Postgres(p) => {
            let mut pooled = checkout(p, deadline, &expired)?;
            let conn: &mut PgConnection = &mut pooled;
            conn.transaction::<_, StoreError, _>(|conn| {
                // Bounds a single statement that would otherwise run past the deadline.
                let budget = deadline.saturating_duration_since(Instant::now()).as_millis().max(1);
                sql_query(format!("SET LOCAL statement_timeout = {budget}")).execute(conn)?;
                for chunk in rows.chunks(INSERT_CHUNK) {
                    check()?;
                    upsert!(conn, chunk)?;
                }
                check()
            })?;
        }
        DbPool::Sqlite(p) => {
            let mut pooled = checkout(p, deadline, &expired)?;
            let conn: &mut SqliteConnection = &mut pooled;
            // Lock waits inside the transaction are bounded by `busy_timeout`.
            conn.immediate_transaction::<_, StoreError, _>(|conn| {
                for row in &rows {
                    check()?;
                    upsert!(conn, row)?;
                }
                check()
            })?;
        }
    }
    Ok(rows.len())
}

fn checkout<M>(
    pool: &diesel::r2d2::Pool<M>,
    deadline: Instant,
    expired: impl Fn() -> StoreError,
) -> Result<diesel::r2d2::PooledConnection<M>, StoreError>
where
    M: diesel::r2d2::ManageConnection,
{
    let remaining = deadline.saturating_duration_since(Instant::now());
    pool.get_timeout(remaining).map_err(|e| {
        if Instant::now() >= deadline {
            expired()
        } else {
            StoreError::Pool(e)
        }
    })
}

// Concurrent saves may finish out of order; the clock only moves forward.
fn advance_clock(clock: &ArcSwapOption<DateTime<Utc>>, now: DateTime<Utc>) {
    clock.rcu(|current| match current {
        Some(seen) if **seen >= now => Some(Arc::clone(seen)),
        _ => Some(Arc::new(now)),
    });
}

/// [`SnapshotStore`] backed by a `daily_bars` table.
#[derive(Debug)]
pub struct SqlStore {
    backend: &'static str,
    policy: LatestPolicy,
    timeouts: OpTimeouts,
    pool: ArcSwapOption<DbPool>,
    last_updated: Arc<ArcSwapOption<DateTime<Utc>>>,
}

impl SqlStore {
    /// Opens a pool for `database_url`, applies pending migrations and seeds
    /// the snapshot clock from the newest stored row.
    pub async fn connect(
        database_url: &str,
        policy: LatestPolicy,
        settings: &PoolSettings,
        timeouts: OpTimeouts,
    ) -> anyhow::Result<Self> {
        let target = DatabaseTarget::parse(database_url);
        let settings = settings.clone();
        let (pool, seeded) = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
            let pool = build_pool(&target, &settings)?;
            migrate::run_on_pool(&pool)?;
            let seeded = max_updated_at(&pool).context("reading snapshot clock")?;
            Ok((pool, seeded))
        })
        .await??;

        let seeded = seeded.map(|naive| naive.and_utc());
        info!(
            backend = pool.backend(),
            policy = ?policy,
            last_updated = ?seeded,
            "sql store opened"
        );

        Ok(Self {
            backend: pool.backend(),
            policy,
            timeouts,
            pool: ArcSwapOption::from_pointee(pool),
            last_updated: Arc::new(ArcSwapOption::new(seeded.map(Arc::new))),
        })
    }

    /// The policy this store resolves "latest" with.
    pub fn policy(&self) -> LatestPolicy {
        self.policy
    }

    /// Runs `f` on the blocking pool and waits for it to finish.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&DbPool) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.load_full().ok_or(StoreError::Closed)?;
        Ok(tokio::task::spawn_blocking(move || f(&pool)).await??)
    }

    async fn read<T, F>(&self, op: &'static str, f: F) -> Vec<T>
    where
        T: Send + 'static,
        F: FnOnce(&DbPool) -> Result<Vec<T>, StoreError> + Send + 'static,
    {
        let after = self.timeouts.read;
        // An abandoned read holds no locks that matter; it is left to finish.
        let result = tokio::time::timeout(after, self.blocking(f))
            .await
            .unwrap_or(Err(StoreError::Timeout { op, after }));
        match result {
            Ok(rows) => rows,
            Err(e) => {
                error!(backend = self.backend, op, error = %e, "read failed");
                Vec::new()
            }
        }
    }

    async fn ranked(&self, ranking: Ranking, limit: usize) -> Vec<RankedBar> {
        if limit == 0 {
            return Vec::new();
        }
        let policy = self.policy;
        let bars = self
            .read(ranking.op(), move |pool| {
                load_bars(pool, &ranking_sql(pool, policy, ranking, limit))
            })
            .await;
        bars.iter().map(RankedBar::from).collect()
    }
}

#[async_trait]
impl SnapshotStore for SqlStore {
    fn backend(&self) -> &'static str {
        self.backend
    }

    async fn save_bars(&self, bars: &[DailyBar]) -> Result<usize, StoreError> {
        if bars.is_empty() {
            return Err(StoreError::EmptyBatch);
        }

        let now = Utc::now().trunc_subsecs(6);
        let after = self.timeouts.write;
        let deadline = Instant::now() + after;
        let owned = bars.to_vec();
        let clock = Arc::clone(&self.last_updated);
        // Awaited to completion: the outcome reported is the outcome committed.
        // The clock moves inside the task so a dropped caller still records it.
        let rows = self
            .blocking(move |pool| {
                let rows = write_batch(pool, &owned, now.naive_utc(), deadline, after)?;
                advance_clock(&clock, now);
                Ok(rows)
            })
            .await?;

        debug!(backend = self.backend, count = rows, "sql store saved batch");
        Ok(bars.len())
    }

    async fn latest_bars(&self) -> Vec<DailyBar> {
        let sql = latest_view(self.policy);
        self.read("latest_bars", move |pool| load_bars(pool, &sql)).await
    }

    async fn top_gainers(&self, limit: usize) -> Vec<RankedBar> {
        self.ranked(Ranking::Gainers, limit).await
    }

    async fn top_losers(&self, limit: usize) -> Vec<RankedBar> {
        self.ranked(Ranking::Losers, limit).await
    }

    async fn most_active(&self, limit: usize) -> Vec<RankedBar> {
        self.ranked(Ranking::MostActive, limit).await
    }

    async fn indices(&self) -> Vec<IndexQuote> {
        let sql = indices_sql(self.policy);
        let bars = self.read("indices", move |pool| load_bars(pool, &sql)).await;
        INDEX_SYMBOLS
            .iter()
            .filter_map(|(symbol, _)| bars.iter().find(|b| b.symbol == *symbol))
            .filter_map(IndexQuote::from_bar)
            .collect()
    }

    fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated.load().as_deref().copied()
    }

    async fn close(&self) {
        if self.pool.swap(None).is_some() {
            info!(backend = self.backend, "sql store closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_view_scopes_to_global_max_date() {
        let sql = latest_view(LatestPolicy::Session);
        assert!(sql.contains("(SELECT MAX(date) FROM daily_bars)"));
        assert!(!sql.contains("GROUP BY"));
    }

    #[test]
    fn indices_query_lists_every_index_symbol() {
        let sql = indices_sql(LatestPolicy::PerSymbol);
        assert!(sql.ends_with("IN ('SPY', 'QQQ', 'DIA', 'IWM')"));
    }

    #[test]
    fn default_timeouts() {
        let t = OpTimeouts::default();
        assert_eq!((t.read.as_secs(), t.write.as_secs()), (10, 120));
    }
}
