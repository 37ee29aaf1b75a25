use crate::config::Settings;
use crate::error::{Service, SyncError};
use crate::listing::TickerListing;
use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

const LISTING_FUNCTION: &str = "LISTING_STATUS";
const LISTING_STATE: &str = "active";

/// Fetches active listings as CSV from an Alpha Vantage compatible endpoint.
#[derive(Debug, Clone)]
pub struct HttpListingProvider {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpListingProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_ticker_listing_api_key()?.trim().to_string();
        Self::new(&settings.ticker_listing_url, &api_key, settings.listing_timeout)
    }

    pub fn new(url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build ticker listing http client")?;

        Ok(Self {
            http,
            url: url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl TickerListing for HttpListingProvider {
    fn provider_name(&self) -> &'static str {
        "alphavantage_listing_status"
    }

    async fn fetch_listing(&self) -> Result<String> {
        let res = self
            .http
            .get(&self.url)
            .query(&[
                ("function", LISTING_FUNCTION),
                ("state", LISTING_STATE),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("ticker listing request failed")?;

        let status = res.status();
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = res
            .bytes()
            .await
            .context("failed to read ticker listing body")?;

        if !status.is_success() {
            return Err(
                SyncError::transient(Service::Listing, format!("listing HTTP {status}")).into(),
            );
        }

        Ok(listing_text(&content_type, &body)?)
    }
}

/// Accepts a listing body only when it is CSV text.
///
/// When throttled or warming up the provider answers 200 with a JSON notice (or an HTML
/// page from a proxy); both count as an upstream that is not ready yet.
pub(crate) fn listing_text(content_type: &str, body: &[u8]) -> Result<String, SyncError> {
    if content_type.contains("json") || content_type.contains("html") {
        return Err(SyncError::transient(
            Service::Listing,
            format!("listing not ready (content-type {content_type})"),
        ));
    }

    let text = std::str::from_utf8(body)
        .map_err(|_| SyncError::transient(Service::Listing, "listing body is not text"))?;

    let leading = text.trim_start();
    if leading.starts_with('{') || leading.starts_with('<') {
        return Err(SyncError::transient(
            Service::Listing,
            "listing not ready (structured notice instead of CSV)",
        ));
    }

    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_csv_bodies() {
        let body = b"symbol,name\nAAA,Acme\n";
        assert_eq!(
            listing_text("application/x-download", body).unwrap(),
            "symbol,name\nAAA,Acme\n"
        );
        assert!(listing_text("text/csv; charset=utf-8", body).is_ok());
        assert!(listing_text("", body).is_ok());
    }

    #[test]
    fn rejects_unready_upstream() {
        let notice = br#"{"Information": "rate limit reached"}"#;
        let err = listing_text("application/json", notice).unwrap_err();
        assert_eq!(err.kind(), "transient_fetch_failure");

        let err = listing_text("text/plain", notice).unwrap_err();
        assert_eq!(err.kind(), "transient_fetch_failure");

        let err = listing_text("text/html", b"<html></html>").unwrap_err();
        assert_eq!(err.kind(), "transient_fetch_failure");
    }

    #[test]
    fn rejects_binary_bodies() {
        let err = listing_text("application/octet-stream", &[0xff, 0xfe, 0x00]).unwrap_err();
        assert_eq!(err.kind(), "transient_fetch_failure");
    }
}
