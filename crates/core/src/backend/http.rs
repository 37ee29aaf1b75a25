use crate::backend::ProfileBackend;
use crate::config::Settings;
use crate::domain::contract::ProfileRecord;
use crate::domain::profile::ProfileId;
use crate::error::{Service, SyncError};
use anyhow::{Context, Result};
use reqwest::{Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

const PROFILE_PATH: &str = "/profile";

#[derive(Debug, Clone)]
pub struct HttpProfileBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpProfileBackend {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(&settings.profile_backend_url, settings.backend_timeout)
    }

    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build profile backend http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}{PROFILE_PATH}", self.base_url)
    }

    fn item_url(&self, id: ProfileId) -> String {
        format!("{}{PROFILE_PATH}/{id}", self.base_url)
    }

    async fn expect_write_accepted(res: Response, op: &'static str) -> Result<()> {
        let status = res.status();
        if status.is_success() {
            return Ok(());
        }

        let body = res.text().await.unwrap_or_default();
        tracing::warn!(op, %status, body = %body, "profile backend rejected write");
        Err(SyncError::BackendRejected {
            status: status.as_u16(),
            detail: rejection_detail(status, &body),
        }
        .into())
    }
}

#[async_trait::async_trait]
impl ProfileBackend for HttpProfileBackend {
    async fn list_profiles(&self) -> Result<Vec<ProfileRecord>> {
        let res = self
            .http
            .get(self.collection_url())
            .send()
            .await
            .context("profile list request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read profile list response")?;
        if !status.is_success() {
            return Err(SyncError::transient(
                Service::Backend,
                format!("GET {PROFILE_PATH} returned HTTP {status}"),
            )
            .into());
        }

        decode_profile_list(&text)
    }

    async fn create_profile(&self, record: &ProfileRecord) -> Result<()> {
        let res = self
            .http
            .post(self.collection_url())
            .json(record)
            .send()
            .await
            .with_context(|| format!("create profile {} request failed", record.id))?;
        Self::expect_write_accepted(res, "create").await
    }

    async fn update_profile(&self, record: &ProfileRecord) -> Result<()> {
        let res = self
            .http
            .put(self.collection_url())
            .json(record)
            .send()
            .await
            .with_context(|| format!("update profile {} request failed", record.id))?;
        Self::expect_write_accepted(res, "update").await
    }

    async fn delete_profile(&self, id: ProfileId) -> Result<()> {
        let res = self
            .http
            .delete(self.item_url(id))
            .send()
            .await
            .with_context(|| format!("delete profile {id} request failed"))?;
        Self::expect_write_accepted(res, "delete").await
    }
}

/// Decodes the collection record by record, so one unreadable entry does not hide the rest.
fn decode_profile_list(text: &str) -> Result<Vec<ProfileRecord>> {
    let raw = serde_json::from_str::<Vec<Value>>(text).map_err(|err| {
        SyncError::malformed(Service::Backend, format!("profile list: {err}"))
    })?;

    let mut records = Vec::with_capacity(raw.len());
    for value in raw {
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<ProfileRecord>(value) {
            Ok(record) => records.push(record),
            Err(err) => tracing::warn!(%id, error = %err, "skipping unreadable profile record"),
        }
    }
    Ok(records)
}

fn rejection_detail(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        body.chars().take(500).collect()
    }
}
