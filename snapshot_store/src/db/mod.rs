//! Database utilities for connections and schema migrations.
//!
//! This module provides:
//! - Target parsing and r2d2 pools: [`connection::DatabaseTarget`], [`connection::build_pool`].
//!   SQLite connections get WAL, foreign_keys=ON, and a 5000ms busy_timeout.
//! - Embedded Diesel migrations and runners: [`migrate::run_sqlite`], [`migrate::run_postgres`],
//!   [`migrate::run_all`] (dispatching on the URL) and [`migrate::run_on_pool`].
//!
//! Example:
//! ```no_run
//! use snapshot_store::db::{connection, migrate};
//!
//! // Treats non-postgres URLs as SQLite, supports bare file paths
//! let db_path = std::env::temp_dir().join("market_example.db");
//! migrate::run_all(db_path.to_str().unwrap()).expect("migrations");
//!
//! let _conn = connection::connect_sqlite(db_path.to_str().unwrap()).expect("connect");
//! ```
//!
//! Note: Building with PostgreSQL support requires the system libpq (e.g., libpq-dev on Debian/Ubuntu).

pub mod connection;
pub mod migrate;
