use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::fetch::FetchError;
use crate::price::PriceValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendCoin {
    pub name: String,
    pub symbol: String,
}

/// A trending topic mapped onto a real coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendEntry {
    pub trend: String,
    pub coin: TrendCoin,
    #[serde(default)]
    pub price: Option<PriceValue>,
    pub source: String,
    pub url: String,
}

impl TrendEntry {
    /// Price to show, or `None` when the mapping carried no usable one.
    pub fn display_price(&self) -> Option<&PriceValue> {
        self.price.as_ref().filter(|price| price.is_present())
    }

    pub fn coin_label(&self) -> String {
        format!(
            "{} ({})",
            self.coin.name.to_uppercase(),
            self.coin.symbol.to_uppercase()
        )
    }
}

pub fn parse_trends(body: &[u8]) -> Result<Vec<TrendEntry>, FetchError> {
    let entries: Option<Vec<TrendEntry>> = serde_json::from_slice(body)?;
    Ok(entries.unwrap_or_default())
}

#[async_trait]
pub trait TrendSource: Send + Sync {
    async fn fetch_trends(&self) -> Result<Vec<TrendEntry>, FetchError>;
}

pub struct HttpTrendSource {
    client: Client,
    url: String,
}

impl HttpTrendSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        HttpTrendSource {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl TrendSource for HttpTrendSource {
    async fn fetch_trends(&self) -> Result<Vec<TrendEntry>, FetchError> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        parse_trends(&body)
    }
}

/// Reads the same JSON array the trends endpoint serves from a local file.
pub struct FileTrendSource {
    path: PathBuf,
}

impl FileTrendSource {
    pub fn new(path: PathBuf) -> Self {
        FileTrendSource { path }
    }
}

#[async_trait]
impl TrendSource for FileTrendSource {
    async fn fetch_trends(&self) -> Result<Vec<TrendEntry>, FetchError> {
        let body = tokio::fs::read(&self.path).await?;
        parse_trends(&body)
    }
}
