#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use market_data_ingestor::models::bar::DailyBar;
use snapshot_store::db::connection::PoolSettings;
use snapshot_store::memory::MemoryStore;
use snapshot_store::sql::{OpTimeouts, SqlStore};
use snapshot_store::{LatestPolicy, SnapshotStore};
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn temp_db() -> TestDb {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();
    TestDb { _dir: dir, path }
}

pub fn small_pool() -> PoolSettings {
    PoolSettings {
        max_size: 4,
        min_idle: Some(1),
        ..PoolSettings::default()
    }
}

pub async fn open_sqlite(db: &TestDb, policy: LatestPolicy) -> SqlStore {
    SqlStore::connect(&format!("sqlite://{}", db.path), policy, &small_pool(), OpTimeouts::default())
        .await
        .expect("open sqlite store")
}

/// One store of each backend, plus the temp dir keeping the SQLite file alive.
pub async fn both_backends(policy: LatestPolicy) -> (TestDb, Vec<Arc<dyn SnapshotStore>>) {
    let db = temp_db();
    let sql = open_sqlite(&db, policy).await;
    let stores: Vec<Arc<dyn SnapshotStore>> = vec![Arc::new(MemoryStore::new(policy)), Arc::new(sql)];
    (db, stores)
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

/// A bar on 2024-03-`d` whose change fields are derived from open and close.
pub fn bar(symbol: &str, d: u32, open: f64, close: f64, volume: i64) -> DailyBar {
    DailyBar {
        symbol: symbol.into(),
        open,
        high: open.max(close),
        low: open.min(close),
        close,
        volume,
        vwap: (open + close) / 2.0,
        date: day(d),
        change: 0.0,
        change_pct: 0.0,
    }
    .with_change()
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

/// `n` distinct symbols on 2024-03-`d`, enough to keep a write busy for a while.
pub fn universe(n: usize, d: u32) -> Vec<DailyBar> {
    (0..n)
        .map(|i| bar(&format!("S{i:05}"), d, 10.0, 11.0, i as i64))
        .collect()
}
