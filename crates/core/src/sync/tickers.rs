use crate::error::{Service, SyncError};
use crate::listing::{parse_listing, TickerListing};
use crate::storage::CacheStore;
use crate::sync::notify::{Action, Notifier};
use std::sync::Arc;

pub const TICKER_CACHE_KEY: &str = "tickers";

/// The universe of selectable ticker symbols.
///
/// Lookup order: in-process memo, then the durable cache, then the listing service. Only a
/// missing or empty cache triggers a fetch; there is no expiry.
pub struct TickerCache {
    listing: Arc<dyn TickerListing>,
    store: Arc<dyn CacheStore>,
    notifier: Notifier,

    // Held across the fetch so concurrent callers share one listing request.
    memo: tokio::sync::Mutex<Option<Arc<[String]>>>,
}

impl TickerCache {
    pub fn new(
        listing: Arc<dyn TickerListing>,
        store: Arc<dyn CacheStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            listing,
            store,
            notifier,
            memo: tokio::sync::Mutex::new(None),
        }
    }

    /// Never fails: when no symbols can be obtained the result is empty and a
    /// [`Action::FetchTickers`] notice is published.
    pub async fn get_tickers(&self) -> Arc<[String]> {
        let mut guard = self.memo.lock().await;
        if let Some(cached) = guard.as_ref() {
            return cached.clone();
        }

        if let Some(cached) = self.load_durable().await {
            tracing::debug!(count = cached.len(), "tickers served from durable cache");
            *guard = Some(cached.clone());
            return cached;
        }

        match self.fetch_and_persist().await {
            Ok(tickers) => {
                if !tickers.is_empty() {
                    *guard = Some(tickers.clone());
                }
                tickers
            }
            Err(err) => {
                self.notifier.publish(Action::FetchTickers, None, &err);
                Vec::new().into()
            }
        }
    }

    async fn load_durable(&self) -> Option<Arc<[String]>> {
        let raw = match self.store.load(TICKER_CACHE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "ticker cache unreadable; refetching");
                return None;
            }
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(tickers) if !tickers.is_empty() => Some(tickers.into()),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(error = %err, "ticker cache is corrupt; refetching");
                None
            }
        }
    }

    async fn fetch_and_persist(&self) -> Result<Arc<[String]>, SyncError> {
        let body = self
            .listing
            .fetch_listing()
            .await
            .map_err(|err| SyncError::classify(Service::Listing, &err))?;
        let tickers = parse_listing(&body)?;

        tracing::info!(
            provider = self.listing.provider_name(),
            count = tickers.len(),
            "fetched ticker listing"
        );

        if tickers.is_empty() {
            tracing::warn!("ticker listing parsed to zero symbols; cache left untouched");
            return Ok(Vec::new().into());
        }

        match serde_json::to_string(&tickers) {
            Ok(encoded) => {
                if let Err(err) = self.store.store(TICKER_CACHE_KEY, &encoded).await {
                    tracing::warn!(error = %format!("{err:#}"), "failed to persist ticker cache");
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to encode ticker cache"),
        }

        Ok(tickers.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeListing, MemoryCache};
    use std::sync::atomic::Ordering;

    const LISTING: &str = "symbol,name,exchange\nAAPL,Apple Inc,NASDAQ\nMSFT,Microsoft,NASDAQ\n";

    fn cache_with(listing: Arc<FakeListing>, store: Arc<MemoryCache>) -> TickerCache {
        TickerCache::new(listing, store, Notifier::default())
    }

    #[tokio::test]
    async fn serves_durable_cache_without_network() {
        let listing = Arc::new(FakeListing::ok(LISTING));
        let store = Arc::new(MemoryCache::with_entry(TICKER_CACHE_KEY, r#"["IBM","ORCL"]"#));
        let cache = cache_with(listing.clone(), store);

        let tickers = cache.get_tickers().await;
        assert_eq!(&*tickers, ["IBM".to_string(), "ORCL".to_string()].as_slice());
        assert_eq!(listing.call_count(), 0);
    }

    #[tokio::test]
    async fn fetches_and_persists_on_cold_cache() {
        let listing = Arc::new(FakeListing::ok(LISTING));
        let store = Arc::new(MemoryCache::default());
        let cache = cache_with(listing.clone(), store.clone());

        let tickers = cache.get_tickers().await;
        assert_eq!(tickers.len(), 2);
        assert_eq!(store.entry(TICKER_CACHE_KEY).as_deref(), Some(r#"["AAPL","MSFT"]"#));

        // Second call is served from memory.
        let again = cache.get_tickers().await;
        assert_eq!(again, tickers);
        assert_eq!(listing.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_or_corrupt_cache_triggers_fetch() {
        for stored in ["[]", "not json"] {
            let listing = Arc::new(FakeListing::ok(LISTING));
            let store = Arc::new(MemoryCache::with_entry(TICKER_CACHE_KEY, stored));
            let cache = cache_with(listing.clone(), store.clone());

            assert_eq!(cache.get_tickers().await.len(), 2);
            assert_eq!(listing.call_count(), 1);
            assert_eq!(
                store.entry(TICKER_CACHE_KEY).as_deref(),
                Some(r#"["AAPL","MSFT"]"#)
            );
        }
    }

    #[tokio::test]
    async fn failure_returns_empty_and_notifies() {
        let listing = Arc::new(FakeListing::failing("connection reset"));
        let store = Arc::new(MemoryCache::default());
        let notifier = Notifier::default();
        let mut notices = notifier.subscribe();
        let cache = TickerCache::new(listing.clone(), store.clone(), notifier);

        assert!(cache.get_tickers().await.is_empty());
        assert_eq!(store.entry(TICKER_CACHE_KEY), None);

        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.action, Action::FetchTickers);
        assert_eq!(notice.error.kind(), "transient_fetch_failure");

        // Not memoized: the next call tries again.
        *listing.body.lock().unwrap() = Ok(LISTING.to_string());
        assert_eq!(cache.get_tickers().await.len(), 2);
        assert_eq!(listing.call_count(), 2);
    }

    #[tokio::test]
    async fn malformed_listing_leaves_cache_untouched() {
        let listing = Arc::new(FakeListing::ok("ticker,name\nAAPL,Apple\n"));
        let store = Arc::new(MemoryCache::default());
        let cache = cache_with(listing, store.clone());

        assert!(cache.get_tickers().await.is_empty());
        assert_eq!(store.entry(TICKER_CACHE_KEY), None);
    }

    #[tokio::test]
    async fn cache_write_failure_still_returns_tickers() {
        let listing = Arc::new(FakeListing::ok(LISTING));
        let store = Arc::new(MemoryCache::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let cache = cache_with(listing, store.clone());

        assert_eq!(cache.get_tickers().await.len(), 2);
        assert_eq!(store.entry(TICKER_CACHE_KEY), None);
    }
}
