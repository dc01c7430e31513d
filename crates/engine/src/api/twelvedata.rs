//! TwelveData REST client (time_series endpoint)
//!
//! Polls the most recent 1-minute bars and turns the newest one into a
//! [`PriceObservation`]. Provider errors come back as HTTP 200 with
//! `"status": "error"`, so the body is inspected before the bars.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

use super::PriceSource;
use crate::error::SourceError;
use crate::types::{PriceObservation, Symbol};

const DEFAULT_BASE_URL: &str = "https://api.twelvedata.com";
const INTERVAL: &str = "1min";
const OUTPUT_SIZE: &str = "5";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// TwelveData market data client
#[derive(Clone)]
pub struct TwelveDataClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    status: Option<String>,
    code: Option<i64>,
    message: Option<String>,
    values: Option<Vec<RawBar>>,
}

/// One bar; prices arrive as decimal strings
#[derive(Debug, Deserialize)]
struct RawBar {
    datetime: String,
    open: Option<String>,
    close: String,
}

impl TwelveDataClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, SourceError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl PriceSource for TwelveDataClient {
    async fn fetch_latest(&self, symbol: &Symbol) -> Result<PriceObservation, SourceError> {
        let url = format!("{}/time_series", self.base_url);
        debug!(symbol = %symbol, "Fetching latest bar from TwelveData");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol.as_str()),
                ("interval", INTERVAL),
                ("outputsize", OUTPUT_SIZE),
                ("timezone", "UTC"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(match parse_time_series(&body) {
                Err(api @ SourceError::Api { .. }) => api,
                _ => SourceError::Api {
                    code: i64::from(status.as_u16()),
                    message: body,
                },
            });
        }

        parse_time_series(&body)
    }
}

/// Extract the newest bar (values[0]) from a time_series body
pub(crate) fn parse_time_series(body: &str) -> Result<PriceObservation, SourceError> {
    let parsed: TimeSeriesResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;

    if parsed.status.as_deref() == Some("error") {
        return Err(SourceError::Api {
            code: parsed.code.unwrap_or_default(),
            message: parsed.message.unwrap_or_else(|| "unknown error".into()),
        });
    }

    let latest = parsed
        .values
        .as_ref()
        .and_then(|v| v.first())
        .ok_or_else(|| SourceError::Malformed("no values in time_series".into()))?;

    let at = parse_bar_time(&latest.datetime)?;
    let close = parse_price(&latest.close)?;
    let open = latest.open.as_deref().map(parse_price).transpose()?;

    Ok(PriceObservation { at, close, open })
}

fn parse_price(raw: &str) -> Result<Decimal, SourceError> {
    Decimal::from_str(raw.trim())
        .map_err(|e| SourceError::Malformed(format!("bad price '{raw}': {e}")))
}

fn parse_bar_time(raw: &str) -> Result<DateTime<Utc>, SourceError> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| SourceError::Malformed(format!("bad datetime '{raw}'")))
}
