use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::fetch::FetchError;
use crate::page::RouteId;

const COIN_PRICE_PATH: &str = "/api/coin-price";

/// A price exactly as the backend sent it. Numbers and numeric strings both
/// occur in the wild and are echoed verbatim into the title and JSON-LD.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceValue {
    Number(serde_json::Number),
    Text(String),
}

impl PriceValue {
    /// Zero and the empty string count as "no price"; the string "0" does not.
    pub fn is_present(&self) -> bool {
        match self {
            PriceValue::Number(number) => number.as_f64().map(|v| v != 0.0).unwrap_or(true),
            PriceValue::Text(text) => !text.is_empty(),
        }
    }
}

#[cfg(test)]
impl From<f64> for PriceValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(PriceValue::Number)
            .unwrap_or_else(|| PriceValue::Text(value.to_string()))
    }
}

#[cfg(test)]
impl From<i64> for PriceValue {
    fn from(value: i64) -> Self {
        PriceValue::Number(value.into())
    }
}

#[cfg(test)]
impl From<&str> for PriceValue {
    fn from(value: &str) -> Self {
        PriceValue::Text(value.to_string())
    }
}

impl fmt::Display for PriceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceValue::Number(number) => match number.as_f64() {
                Some(value) if number.is_f64() => write_decimal(f, value),
                _ => write!(f, "{number}"),
            },
            PriceValue::Text(text) => f.write_str(text),
        }
    }
}

/// Plain decimal notation between 1e-6 and 1e21, exponent form outside it,
/// matching how browsers stringify numbers.
fn write_decimal(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    let magnitude = value.abs();
    if magnitude == 0.0 {
        return f.write_str("0");
    }
    if (1e-6..1e21).contains(&magnitude) {
        return write!(f, "{value}");
    }
    let exponent = format!("{value:e}");
    match exponent.split_once('e') {
        Some((mantissa, power)) if !power.starts_with('-') => write!(f, "{mantissa}e+{power}"),
        _ => f.write_str(&exponent),
    }
}

impl Serialize for PriceValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            PriceValue::Number(number) => number.serialize(serializer),
            PriceValue::Text(text) => serializer.serialize_str(text),
        }
    }
}

impl<'de> Deserialize<'de> for PriceValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PriceVisitor;
        impl<'de> Visitor<'de> for PriceVisitor {
            type Value = PriceValue;
            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a number or a numeric string")
            }
            fn visit_i64<E>(self, value: i64) -> Result<PriceValue, E>
            where
                E: de::Error,
            {
                Ok(PriceValue::Number(value.into()))
            }
            fn visit_u64<E>(self, value: u64) -> Result<PriceValue, E>
            where
                E: de::Error,
            {
                Ok(PriceValue::Number(value.into()))
            }
            fn visit_f64<E>(self, value: f64) -> Result<PriceValue, E>
            where
                E: de::Error,
            {
                serde_json::Number::from_f64(value)
                    .map(PriceValue::Number)
                    .ok_or_else(|| E::custom(format!("non-finite price {value}")))
            }
            fn visit_str<E>(self, value: &str) -> Result<PriceValue, E>
            where
                E: de::Error,
            {
                Ok(PriceValue::Text(value.to_string()))
            }
            fn visit_string<E>(self, value: String) -> Result<PriceValue, E>
            where
                E: de::Error,
            {
                Ok(PriceValue::Text(value))
            }
        }
        deserializer.deserialize_any(PriceVisitor)
    }
}

/// One successful lookup. `icon` is `None` when the backend sent none (or an
/// empty one); the page substitutes its fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub price: PriceValue,
    pub icon: Option<String>,
}

impl PriceQuote {
    pub fn icon_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.icon.as_deref().unwrap_or(fallback)
    }
}

#[derive(Debug, Deserialize)]
struct CoinPriceResponse {
    #[serde(default)]
    price: Option<PriceValue>,
    #[serde(default, deserialize_with = "icon_if_text")]
    icon: Option<String>,
}

// Anything but a string leaves the icon unset so the fallback is used.
fn icon_if_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(icon)) => Ok(Some(icon)),
        _ => Ok(None),
    }
}

pub fn parse_price_response(body: &[u8]) -> Result<PriceQuote, FetchError> {
    let response: Option<CoinPriceResponse> = serde_json::from_slice(body)?;
    let response = response.ok_or(FetchError::PriceMissing)?;
    let price = response
        .price
        .filter(PriceValue::is_present)
        .ok_or(FetchError::PriceMissing)?;
    let icon = response.icon.filter(|icon| !icon.trim().is_empty());
    Ok(PriceQuote { price, icon })
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price(&self, route: &RouteId) -> Result<PriceQuote, FetchError>;
}

pub struct HttpPriceSource {
    client: Client,
    api_base: String,
}

impl HttpPriceSource {
    pub fn new(client: Client, api_base: impl Into<String>) -> Self {
        HttpPriceSource {
            client,
            api_base: api_base.into(),
        }
    }

    pub fn request_url(&self, route: &RouteId) -> Result<String, FetchError> {
        let query = serde_urlencoded::to_string(&[("symbol", route.as_str())])
            .map_err(|err| FetchError::Transport(format!("encoding query: {err}")))?;
        Ok(format!("{}{}?{}", self.api_base, COIN_PRICE_PATH, query))
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch_price(&self, route: &RouteId) -> Result<PriceQuote, FetchError> {
        let url = self.request_url(route)?;
        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        parse_price_response(&body)
    }
}
