pub mod backend;
pub mod codec;
pub mod domain;
pub mod error;
pub mod listing;
pub mod prediction;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod fakes;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;
    use std::time::Duration;

    const DEFAULT_PROFILE_BACKEND_URL: &str = "http://localhost:8080";
    const DEFAULT_PREDICTION_SERVICE_URL: &str = "http://localhost:5000";
    const DEFAULT_TICKER_LISTING_URL: &str = "https://www.alphavantage.co/query";
    const DEFAULT_TICKER_CACHE_DIR: &str = ".tickerdesk";

    const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 10;
    const DEFAULT_LISTING_TIMEOUT_SECS: u64 = 30;
    // Model runs on the prediction side take a while.
    const DEFAULT_PREDICTION_TIMEOUT_SECS: u64 = 120;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub profile_backend_url: String,
        pub prediction_service_url: String,
        pub ticker_listing_url: String,
        pub ticker_listing_api_key: Option<String>,
        pub ticker_cache_dir: PathBuf,
        pub sentry_dsn: Option<String>,
        pub backend_timeout: Duration,
        pub listing_timeout: Duration,
        pub prediction_timeout: Duration,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                profile_backend_url: env_or("PROFILE_BACKEND_URL", DEFAULT_PROFILE_BACKEND_URL),
                prediction_service_url: env_or(
                    "PREDICTION_SERVICE_URL",
                    DEFAULT_PREDICTION_SERVICE_URL,
                ),
                ticker_listing_url: env_or("TICKER_LISTING_URL", DEFAULT_TICKER_LISTING_URL),
                ticker_listing_api_key: std::env::var("TICKER_LISTING_API_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                ticker_cache_dir: PathBuf::from(env_or(
                    "TICKER_CACHE_DIR",
                    DEFAULT_TICKER_CACHE_DIR,
                )),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                backend_timeout: timeout_from_env(
                    "PROFILE_BACKEND_TIMEOUT_SECS",
                    DEFAULT_BACKEND_TIMEOUT_SECS,
                )?,
                listing_timeout: timeout_from_env(
                    "TICKER_LISTING_TIMEOUT_SECS",
                    DEFAULT_LISTING_TIMEOUT_SECS,
                )?,
                prediction_timeout: timeout_from_env(
                    "PREDICTION_TIMEOUT_SECS",
                    DEFAULT_PREDICTION_TIMEOUT_SECS,
                )?,
            })
        }

        pub fn require_ticker_listing_api_key(&self) -> anyhow::Result<&str> {
            self.ticker_listing_api_key
                .as_deref()
                .context("TICKER_LISTING_API_KEY is required")
        }
    }

    fn env_or(key: &str, default: &str) -> String {
        std::env::var(key)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn timeout_from_env(key: &str, default_secs: u64) -> anyhow::Result<Duration> {
        let secs = match std::env::var(key) {
            Ok(s) => s
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{key} must be a whole number of seconds (got {s:?})"))?,
            Err(_) => default_secs,
        };
        anyhow::ensure!(secs >= 1, "{key} must be >= 1");
        Ok(Duration::from_secs(secs))
    }
}
