use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;

use crate::error_log::ErrorLogStore;
use crate::metadata::{DEFAULT_FALLBACK_ICON, DEFAULT_SITE_BASE, SiteConfig};

pub const DEFAULT_API_BASE: &str = "http://localhost:5014";
const MAPPED_TRENDS_PATH: &str = "/api/mapped-trends";

/// Coin quote page: renders one coin's BRL quote, SEO metadata and mapped
/// trends as HTML, or previews the page in the terminal.
#[derive(Parser, Clone, Debug)]
#[clap(name = "cotacao", version)]
pub struct CliParams {
    /// Coin symbol from the page route (e.g. btc); omitted leaves the page loading
    #[clap(value_name = "MOEDA")]
    pub moeda: Option<String>,

    /// Base URL of the backend serving /api/coin-price
    #[clap(long = "api-base", env = "COTACAO_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// URL of the mapped trends list (default: <api-base>/api/mapped-trends)
    #[clap(long = "trends-url", env = "COTACAO_TRENDS_URL")]
    pub trends_url: Option<String>,

    /// Read mapped trends from a local JSON file; takes precedence over --trends-url
    #[clap(long = "trends-file", value_name = "PATH")]
    pub trends_file: Option<PathBuf>,

    /// Public site base used for canonical and purchase URLs
    #[clap(long = "site-base", env = "COTACAO_SITE_BASE", default_value = DEFAULT_SITE_BASE)]
    pub site_base: String,

    /// Icon used when the price API returns none
    #[clap(
        long = "fallback-icon",
        env = "COTACAO_FALLBACK_ICON",
        default_value = DEFAULT_FALLBACK_ICON
    )]
    pub fallback_icon: String,

    /// HTTP timeout per request (e.g., 5s, 1m)
    #[clap(long = "timeout", value_name = "DURATION", default_value = "20s")]
    pub timeout: DurationSpec,

    /// Write the rendered HTML here instead of stdout
    #[clap(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// JSONL file receiving fetch failures
    #[clap(long = "error-log", value_name = "PATH")]
    pub error_log: Option<PathBuf>,

    /// Open the interactive terminal preview instead of rendering HTML
    #[clap(long = "tui")]
    pub tui: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrendsLocation {
    Url(String),
    File(PathBuf),
}

impl CliParams {
    pub fn api_base(&self) -> String {
        normalize_base_url(&self.api_base, DEFAULT_API_BASE)
    }

    pub fn trends_location(&self) -> TrendsLocation {
        if let Some(path) = &self.trends_file {
            return TrendsLocation::File(path.clone());
        }
        let url = self
            .trends_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| url.to_string())
            .unwrap_or_else(|| format!("{}{}", self.api_base(), MAPPED_TRENDS_PATH));
        TrendsLocation::Url(url)
    }

    pub fn site_config(&self) -> SiteConfig {
        let fallback_icon = self.fallback_icon.trim();
        SiteConfig {
            site_base: normalize_base_url(&self.site_base, DEFAULT_SITE_BASE),
            fallback_icon: if fallback_icon.is_empty() {
                DEFAULT_FALLBACK_ICON.to_string()
            } else {
                fallback_icon.to_string()
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.timeout.as_duration()
    }

    pub fn error_log_store(&self) -> ErrorLogStore {
        ErrorLogStore::new(
            self.error_log
                .clone()
                .unwrap_or_else(ErrorLogStore::default_path),
        )
    }
}

#[derive(Copy, Clone, Debug)]
pub struct DurationSpec(Duration);

impl DurationSpec {
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl FromStr for DurationSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let duration = parse_duration_spec(s)?;
        Ok(DurationSpec(duration))
    }
}

fn parse_duration_spec(input: &str) -> Result<Duration, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("duration spec cannot be empty (examples: 5s, 1m)".to_string());
    }
    let split_idx = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| "duration spec must end with a unit like s, m, h, or d".to_string())?;
    if split_idx == 0 {
        return Err("duration spec must start with a number (examples: 5s, 1m)".to_string());
    }
    let (value_part, unit_part) = trimmed.split_at(split_idx);
    let value: f64 = value_part.parse().map_err(|_| {
        format!(
            "invalid numeric portion `{}` in duration spec `{}`",
            value_part, trimmed
        )
    })?;
    let unit = unit_part.trim().to_lowercase();
    let seconds_multiplier = match unit.as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 60.0 * 60.0,
        "d" | "day" | "days" => 60.0 * 60.0 * 24.0,
        other => {
            return Err(format!(
                "unsupported duration unit `{}` (use s, m, h, or d)",
                other
            ));
        }
    };
    let seconds = value * seconds_multiplier;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("duration must be positive: `{}`", trimmed));
    }
    if seconds > Duration::MAX.as_secs_f64() {
        return Err(format!("duration `{}` is too large", trimmed));
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn normalize_base_url(value: &str, default: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    // Serializes tests that read or write COTACAO_* variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn parse(args: &[&str]) -> CliParams {
        let mut argv = vec!["cotacao"];
        argv.extend_from_slice(args);
        CliParams::try_parse_from(argv).expect("valid args")
    }

    #[test]
    fn defaults_match_the_public_site() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let params = parse(&["btc"]);
        assert_eq!(params.moeda.as_deref(), Some("btc"));
        assert_eq!(params.api_base(), "http://localhost:5014");
        assert_eq!(
            params.trends_location(),
            TrendsLocation::Url("http://localhost:5014/api/mapped-trends".to_string())
        );
        assert_eq!(params.site_config(), SiteConfig::default());
        assert_eq!(params.request_timeout(), Duration::from_secs(20));
        assert!(!params.tui);
    }

    #[test]
    fn base_urls_are_trimmed() {
        let params = parse(&[
            "--api-base",
            " https://api.example/ ",
            "--site-base",
            "https://site.example//",
            "--fallback-icon",
            "  ",
        ]);
        assert_eq!(params.api_base(), "https://api.example");
        let site = params.site_config();
        assert_eq!(site.site_base, "https://site.example");
        assert_eq!(site.fallback_icon, DEFAULT_FALLBACK_ICON);
    }

    #[test]
    fn trends_file_overrides_url() {
        let params = parse(&["--trends-file", "trends.json"]);
        assert_eq!(
            params.trends_location(),
            TrendsLocation::File(PathBuf::from("trends.json"))
        );
        let params = parse(&["--trends-file", "a.json", "--trends-url", "http://x"]);
        assert_eq!(
            params.trends_location(),
            TrendsLocation::File(PathBuf::from("a.json"))
        );
    }

    #[test]
    fn trends_file_wins_over_exported_trends_url() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // SAFETY: every test touching COTACAO_* holds ENV_LOCK.
        unsafe { std::env::set_var("COTACAO_TRENDS_URL", "http://x/trends") };
        let with_file = CliParams::try_parse_from(["cotacao", "btc", "--trends-file", "t.json"]);
        let url_only = CliParams::try_parse_from(["cotacao", "btc"]);
        unsafe { std::env::remove_var("COTACAO_TRENDS_URL") };

        assert_eq!(
            with_file.expect("file flag accepted").trends_location(),
            TrendsLocation::File(PathBuf::from("t.json"))
        );
        assert_eq!(
            url_only.expect("env url accepted").trends_location(),
            TrendsLocation::Url("http://x/trends".to_string())
        );
    }

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration_spec("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration_spec("1.5m").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration_spec(" 2 h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(parse_duration_spec("").is_err());
        assert!(parse_duration_spec("10").is_err());
        assert!(parse_duration_spec("s").is_err());
        assert!(parse_duration_spec("0s").is_err());
        assert!(parse_duration_spec("3w").is_err());
    }
}
