use crate::storage::CacheStore;
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::PathBuf;

/// Stores each key as `<root>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    root: PathBuf,
}

impl FileCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        anyhow::ensure!(
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "invalid cache key: {key:?}"
        );
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait::async_trait]
impl CacheStore for FileCacheStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(s) => Ok(Some(s)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed to read cache file {}", path.display()))
            }
        }
    }

    async fn store(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create cache dir {}", self.root.display()))?;

        // Readers must never observe a half-written file.
        let tmp = self.root.join(format!(".{key}.json.tmp"));
        tokio::fs::write(&tmp, value)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("failed to move cache file into {}", path.display()))?;

        tracing::debug!(path = %path.display(), bytes = value.len(), "cache entry written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        assert_eq!(store.load("tickers").await.unwrap(), None);
    }

    #[tokio::test]
    async fn stores_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path().join("nested"));

        store.store("tickers", "[\"AAA\"]").await.unwrap();
        store.store("tickers", "[\"BBB\"]").await.unwrap();

        assert_eq!(
            store.load("tickers").await.unwrap().as_deref(),
            Some("[\"BBB\"]")
        );
        assert!(dir.path().join("nested").join("tickers.json").exists());
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        assert!(store.store("../escape", "x").await.is_err());
        assert!(store.load("").await.is_err());
    }
}
