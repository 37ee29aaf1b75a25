//! The third-party ticker listing service.

pub mod parse;
pub mod provider;

pub use parse::parse_listing;
pub use provider::HttpListingProvider;

#[async_trait::async_trait]
pub trait TickerListing: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Fetches the raw tabular listing body.
    async fn fetch_listing(&self) -> anyhow::Result<String>;
}
