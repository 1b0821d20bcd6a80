//! Market snapshot store: per-symbol daily bar history with ranking queries.
//!
//! - [`store::SnapshotStore`] is the contract; [`memory::MemoryStore`] and
//!   [`sql::SqlStore`] implement it.
//! - [`open::open_store`] picks a backend from configuration and falls back
//!   to memory when the database is unavailable.
//! - [`facade::QueryFacade`] shapes store reads into the dashboard's read models.

#![deny(missing_docs)]

pub mod db;
pub mod facade;
pub mod memory;
pub mod models;
pub mod open;
pub mod ranking;
#[allow(missing_docs)]
pub mod schema;
pub mod sql;
pub mod store;

pub use open::{StoreOptions, open_store};
pub use store::{LatestPolicy, SnapshotStore, StoreError};
