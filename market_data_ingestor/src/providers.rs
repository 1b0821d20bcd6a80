//! Provider abstraction for end-of-day market data sources.
//!
//! This module defines the [`MarketDataProvider`] trait, the interface the
//! ingestion scheduler uses to pull one day of bars for the whole US stock
//! universe, independent of the vendor behind it.
//!
//! The trait is async and object safe, so callers can hold an
//! `Arc<dyn MarketDataProvider>` selected at runtime (or a fake in tests).
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use chrono::NaiveDate;
//! use market_data_ingestor::models::bar::DailyBar;
//! use market_data_ingestor::providers::{MarketDataProvider, NoDataSnafu, ProviderError};
//!
//! struct EmptyProvider;
//!
//! #[async_trait]
//! impl MarketDataProvider for EmptyProvider {
//!     async fn grouped_daily(&self, _date: NaiveDate) -> Result<Vec<DailyBar>, ProviderError> {
//!         Ok(vec![])
//!     }
//!
//!     async fn previous_close(&self, symbol: &str) -> Result<DailyBar, ProviderError> {
//!         NoDataSnafu { symbol }.fail()
//!     }
//! }
//! ```

pub mod polygon_rest;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::bar::DailyBar;

/// Trait for fetching end-of-day bars from a market data vendor.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetches every symbol's bar for `date` in one call.
    ///
    /// Bars come back with `change`/`change_pct` unset; computing them is the
    /// caller's job. An empty vector means the vendor has no session for that
    /// date (weekend, holiday, not yet published).
    async fn grouped_daily(&self, date: NaiveDate) -> Result<Vec<DailyBar>, ProviderError>;

    /// Fetches the most recent completed bar for a single symbol.
    async fn previous_close(&self, symbol: &str) -> Result<DailyBar, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `MarketDataProvider` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The provider answered with a non-success HTTP status.
    #[snafu(display("unexpected status code {status}: {body}"))]
    Status {
        status: u16,
        body: String,
        backtrace: Backtrace,
    },

    /// The response body could not be decoded.
    #[snafu(display("decoding response: {source} (preview: {preview})"))]
    Decode {
        source: serde_json::Error,
        preview: String,
        backtrace: Backtrace,
    },

    /// The provider returned no bar for the requested symbol.
    #[snafu(display("no data found for {symbol}"))]
    NoData {
        symbol: String,
        backtrace: Backtrace,
    },
}
