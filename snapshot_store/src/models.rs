//! Diesel row types for [`crate::schema::daily_bars`].

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use market_data_ingestor::models::bar::DailyBar;

use crate::schema::daily_bars;

/// Insertable form of a [`DailyBar`], stamped with the write time.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = daily_bars)]
pub struct NewDailyBar<'a> {
    /// Ticker symbol.
    pub symbol: &'a str,
    /// Trading date.
    pub date: NaiveDate,
    /// Opening price.
    pub open: f64,
    /// Session high.
    pub high: f64,
    /// Session low.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Shares traded.
    pub volume: i64,
    /// Volume-weighted average price.
    pub vwap: f64,
    /// `close - open`.
    pub change: f64,
    /// Percent change, stored under its column name.
    pub change_percent: f64,
    /// UTC write time; refreshed on every upsert.
    pub updated_at: NaiveDateTime,
}

impl<'a> NewDailyBar<'a> {
    /// Borrows `bar` for insertion at `updated_at`.
    pub fn from_bar(bar: &'a DailyBar, updated_at: NaiveDateTime) -> Self {
        Self {
            symbol: &bar.symbol,
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            vwap: bar.vwap,
            change: bar.change,
            change_percent: bar.change_pct,
            updated_at,
        }
    }
}

/// A `daily_bars` row loaded by name from a raw query.
#[derive(Debug, Clone, QueryableByName)]
#[diesel(table_name = daily_bars)]
pub struct BarRow {
    /// Ticker symbol.
    pub symbol: String,
    /// Trading date.
    pub date: NaiveDate,
    /// Opening price.
    pub open: f64,
    /// Session high.
    pub high: f64,
    /// Session low.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Shares traded.
    pub volume: i64,
    /// Volume-weighted average price.
    pub vwap: f64,
    /// `close - open`.
    pub change: f64,
    /// Percent change.
    pub change_percent: f64,
}

impl From<BarRow> for DailyBar {
    fn from(row: BarRow) -> Self {
        DailyBar {
            symbol: row.symbol,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            vwap: row.vwap,
            date: row.date,
            change: row.change,
            change_pct: row.change_percent,
        }
    }
}
