use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::get_env_var;
use snafu::ResultExt;

use crate::{
    models::bar::DailyBar,
    providers::{
        ClientBuildSnafu, DecodeSnafu, MarketDataProvider, MissingEnvVarSnafu, NoDataSnafu,
        ProviderError, ProviderInitError, ReqwestSnafu, StatusSnafu,
        polygon_rest::response::{AggsResponse, PolygonAgg},
    },
    tz::market_date_from_millis,
};

/// Default public endpoint.
pub const BASE_URL: &str = "https://api.polygon.io";

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "POLYGON_API_KEY";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const PREVIEW_LEN: usize = 500;

pub struct PolygonProvider {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl PolygonProvider {
    /// Creates a provider against the public Polygon endpoint.
    pub fn new(api_key: SecretString) -> Result<Self, ProviderInitError> {
        Self::with_base_url(api_key, BASE_URL)
    }

    /// Creates a provider reading the key from `POLYGON_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderInitError> {
        let key = get_env_var(API_KEY_VAR).context(MissingEnvVarSnafu)?;
        Self::new(SecretString::new(key.into()))
    }

    /// Creates a provider against an alternate endpoint (proxies, mock servers).
    pub fn with_base_url(
        api_key: SecretString,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderInitError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get_aggs(&self, path: &str) -> Result<AggsResponse, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.expose_secret())])
            .send()
            .await
            .context(ReqwestSnafu)?;

        let status = response.status();
        let body = response.text().await.context(ReqwestSnafu)?;

        if !status.is_success() {
            return StatusSnafu {
                status: status.as_u16(),
                body: preview(&body),
            }
            .fail();
        }

        serde_json::from_str(&body).context(DecodeSnafu {
            preview: preview(&body),
        })
    }
}

fn preview(body: &str) -> String {
    body.chars().take(PREVIEW_LEN).collect()
}

fn to_bar(symbol: String, date: NaiveDate, agg: &PolygonAgg) -> DailyBar {
    DailyBar {
        symbol,
        open: agg.open,
        high: agg.high,
        low: agg.low,
        close: agg.close,
        volume: agg.volume as i64,
        vwap: agg.vwap.unwrap_or(0.0),
        date,
        change: 0.0,
        change_pct: 0.0,
    }
}

#[async_trait]
impl MarketDataProvider for PolygonProvider {
    async fn grouped_daily(&self, date: NaiveDate) -> Result<Vec<DailyBar>, ProviderError> {
        let path = format!(
            "/v2/aggs/grouped/locale/us/market/stocks/{}",
            date.format("%Y-%m-%d")
        );
        let resp = self.get_aggs(&path).await?;

        let results = resp.results.unwrap_or_default();
        let mut bars = Vec::with_capacity(results.len());
        for agg in &results {
            match agg.ticker.as_deref().map(str::trim) {
                Some(t) if !t.is_empty() => bars.push(to_bar(t.to_string(), date, agg)),
                _ => tracing::debug!(%date, "skipping grouped result without ticker"),
            }
        }

        tracing::debug!(%date, status = %resp.status, count = bars.len(), "decoded grouped daily bars");
        Ok(bars)
    }

    async fn previous_close(&self, symbol: &str) -> Result<DailyBar, ProviderError> {
        let path = format!("/v2/aggs/ticker/{symbol}/prev");
        let resp = self.get_aggs(&path).await?;

        let agg = resp
            .results
            .as_ref()
            .and_then(|r| r.first())
            .ok_or_else(|| NoDataSnafu { symbol }.build())?;
        let date = market_date_from_millis(agg.timestamp)
            .ok_or_else(|| NoDataSnafu { symbol }.build())?;
        let ticker = agg.ticker.clone().unwrap_or_else(|| symbol.to_string());

        Ok(to_bar(ticker, date, agg))
    }
}
