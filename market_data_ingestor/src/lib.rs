//! End-of-day market data: the canonical bar model and the provider clients
//! that fetch it.

pub mod models;
pub mod providers;
pub mod tz;
