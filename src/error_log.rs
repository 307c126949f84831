use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::fetch::FetchError;
use crate::page::RouteId;

/// Which loader a failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureScope {
    Price,
    Trends,
}

/// One line of the error log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub timestamp_ms: i64,
    pub scope: FailureScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    pub message: String,
}

impl FailureRecord {
    pub fn price(route: &RouteId, err: &FetchError) -> Self {
        FailureRecord {
            timestamp_ms: Local::now().timestamp_millis(),
            scope: FailureScope::Price,
            route: Some(route.as_str().to_string()),
            message: err.to_string(),
        }
    }

    pub fn trends(err: &FetchError) -> Self {
        FailureRecord {
            timestamp_ms: Local::now().timestamp_millis(),
            scope: FailureScope::Trends,
            route: None,
            message: err.to_string(),
        }
    }
}

/// Append-only JSONL file of fetch failures.
#[derive(Clone, Debug)]
pub struct ErrorLogStore {
    path: PathBuf,
}

impl ErrorLogStore {
    pub fn new(path: PathBuf) -> Self {
        ErrorLogStore { path }
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("error_logs.jsonl")
    }

    pub fn record(&self, failure: &FailureRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut line = serde_json::to_vec(failure)?;
        line.push(b'\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(&line))
            .with_context(|| format!("appending to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn appends_one_json_line_per_failure() {
        let dir = std::env::temp_dir().join(format!("cotacao-error-log-{}", std::process::id()));
        let path = dir.join("nested").join("errors.jsonl");
        let store = ErrorLogStore::new(path.clone());
        let route = RouteId::parse("btc").unwrap();
        store
            .record(&FailureRecord::price(&route, &FetchError::PriceMissing))
            .unwrap();
        store
            .record(&FailureRecord::trends(&FetchError::Io("missing".into())))
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<FailureRecord> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].scope, FailureScope::Price);
        assert_eq!(lines[0].route.as_deref(), Some("btc"));
        assert_eq!(lines[0].message, "Preço não encontrado.");
        assert_eq!(lines[1].scope, FailureScope::Trends);
        assert_eq!(lines[1].route, None);
        assert_eq!(lines[1].message, "io error: missing");
        assert!(lines[0].timestamp_ms > 0);
        assert!(contents.lines().nth(1).is_some_and(|line| !line.contains("route")));
        let _ = fs::remove_dir_all(&dir);
    }
}
