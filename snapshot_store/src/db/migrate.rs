//! Embedded schema migrations.

use anyhow::anyhow;
use diesel::{Connection, PgConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

use super::connection::{DatabaseTarget, DbPool, connect_sqlite};

/// Embedded Diesel migrations bundled with this crate.
///
/// These create the `daily_bars` table and its date index.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

fn log_applied(backend: &str, applied: usize) {
    if applied > 0 {
        info!(backend, applied, "applied pending migrations");
    }
}

/// Runs pending Diesel migrations on a SQLite database at the given path.
pub fn run_sqlite(path: &str) -> anyhow::Result<()> {
    let mut conn = connect_sqlite(path)?;
    let applied = conn.run_pending_migrations(MIGRATIONS).map_err(|e| anyhow!(e))?;
    log_applied("sqlite", applied.len());
    Ok(())
}

/// Runs pending Diesel migrations on a PostgreSQL database at the given URL.
pub fn run_postgres(url: &str) -> anyhow::Result<()> {
    let mut conn = PgConnection::establish(url)?;
    let applied = conn.run_pending_migrations(MIGRATIONS).map_err(|e| anyhow!(e))?;
    log_applied("postgres", applied.len());
    Ok(())
}

/// Runs pending migrations for the given database URL by delegating to the
/// appropriate backend (see [`DatabaseTarget::parse`]).
pub fn run_all(database_url: &str) -> anyhow::Result<()> {
    match DatabaseTarget::parse(database_url) {
        DatabaseTarget::Postgres(url) => run_postgres(&url),
        DatabaseTarget::Sqlite(path) => run_sqlite(&path),
    }
}

/// Runs pending migrations through a pooled connection.
///
/// Needed for `:memory:` SQLite, where a separate connection would migrate a
/// different database.
pub fn run_on_pool(pool: &DbPool) -> anyhow::Result<()> {
    let applied = match pool {
        DbPool::Postgres(p) => {
            let mut pooled = p.get()?;
            let conn: &mut PgConnection = &mut pooled;
            conn.run_pending_migrations(MIGRATIONS).map_err(|e| anyhow!(e))?.len()
        }
        DbPool::Sqlite(p) => {
            let mut pooled = p.get()?;
            let conn: &mut diesel::SqliteConnection = &mut pooled;
            conn.run_pending_migrations(MIGRATIONS).map_err(|e| anyhow!(e))?.len()
        }
    };
    log_applied(pool.backend(), applied);
    Ok(())
}
