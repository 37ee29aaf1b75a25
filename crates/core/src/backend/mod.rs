//! The profile CRUD backend.

pub mod http;

use crate::domain::contract::ProfileRecord;
use crate::domain::profile::ProfileId;

pub use http::HttpProfileBackend;

#[async_trait::async_trait]
pub trait ProfileBackend: Send + Sync {
    async fn list_profiles(&self) -> anyhow::Result<Vec<ProfileRecord>>;

    async fn create_profile(&self, record: &ProfileRecord) -> anyhow::Result<()>;

    async fn update_profile(&self, record: &ProfileRecord) -> anyhow::Result<()>;

    async fn delete_profile(&self, id: ProfileId) -> anyhow::Result<()>;
}
