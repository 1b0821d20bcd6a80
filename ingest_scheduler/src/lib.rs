//! Daily ingestion of end-of-day bars into the snapshot store.
//!
//! - [`trading_day`] picks the session a run should fetch.
//! - [`cycle::Ingestor`] runs one fetch → derive → save cycle.
//! - [`scheduler::Scheduler`] triggers cycles on a cron calendar.
//! - [`config::AppConfig`] and [`logging::init_logging`] wire up the process.

#![deny(missing_docs)]

pub mod config;
pub mod cycle;
pub mod logging;
pub mod scheduler;
pub mod trading_day;
