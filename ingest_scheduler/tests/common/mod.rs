#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use market_data_ingestor::models::bar::DailyBar;
use market_data_ingestor::providers::{
    MarketDataProvider, NoDataSnafu, ProviderError, StatusSnafu,
};

/// What the fake answers to `grouped_daily`.
pub enum Script {
    Bars(Vec<DailyBar>),
    Empty,
    Fail,
    Hang,
}

/// In-process provider that stamps its scripted bars with the requested date.
pub struct FakeProvider {
    script: Script,
    pub requested: Mutex<Vec<NaiveDate>>,
}

impl FakeProvider {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<NaiveDate> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    async fn grouped_daily(&self, date: NaiveDate) -> Result<Vec<DailyBar>, ProviderError> {
        self.requested.lock().unwrap().push(date);
        match &self.script {
            Script::Bars(bars) => Ok(bars
                .iter()
                .cloned()
                .map(|mut b| {
                    b.date = date;
                    b
                })
                .collect()),
            Script::Empty => Ok(Vec::new()),
            Script::Fail => StatusSnafu {
                status: 502u16,
                body: "bad gateway",
            }
            .fail(),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn previous_close(&self, symbol: &str) -> Result<DailyBar, ProviderError> {
        NoDataSnafu { symbol }.fail()
    }
}

/// Raw provider bar: change fields left at zero.
pub fn raw_bar(symbol: &str, open: f64, close: f64, volume: i64) -> DailyBar {
    DailyBar {
        symbol: symbol.into(),
        open,
        high: open.max(close),
        low: open.min(close),
        close,
        volume,
        vwap: 0.0,
        date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
        change: 0.0,
        change_pct: 0.0,
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
