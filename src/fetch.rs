use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use thiserror::Error;

/// Failure of one backend fetch. Cloned onto the command channel, so causes
/// are carried as text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("Preço não encontrado.")]
    PriceMissing,

    #[error("io error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            let url = err
                .url()
                .map(|url| url.to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            return FetchError::Status {
                status: status.as_u16(),
                url,
            };
        }
        if err.is_decode() {
            return FetchError::Decode(err.to_string());
        }
        FetchError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Io(err.to_string())
    }
}

pub fn build_http_client(timeout: Duration) -> Result<Client, anyhow::Error> {
    let connect_timeout = timeout.min(Duration::from_secs(5));
    Ok(ClientBuilder::new()
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .build()?)
}
