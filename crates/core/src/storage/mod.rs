//! Durable local key/value cache.

pub mod file;

pub use file::FileCacheStore;

#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns `None` when nothing has been stored under `key`.
    async fn load(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn store(&self, key: &str, value: &str) -> anyhow::Result<()>;
}
