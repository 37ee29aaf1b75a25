//! In-memory implementations of the client traits for tests.

use crate::backend::ProfileBackend;
use crate::domain::contract::{Prediction, PredictionRequest, ProfileRecord};
use crate::domain::profile::ProfileId;
use crate::domain::risk::{RiskAssessment, RiskLevel};
use crate::error::SyncError;
use crate::listing::TickerListing;
use crate::prediction::PredictionClient;
use crate::storage::CacheStore;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub fn plot_json(tag: &str) -> String {
    json!({"data": [{"name": tag, "y": [1, 2, 3]}], "layout": {"title": tag}}).to_string()
}

pub fn sample_risk() -> RiskAssessment {
    RiskAssessment {
        short_term: Some(RiskLevel::Low),
        medium_term: Some(RiskLevel::Moderate),
        long_term: Some(RiskLevel::High),
    }
}

/// In-memory profile backend.
///
/// `list_gate` holds back the next list call only: it reads the records first, then waits,
/// so it answers with state that may since have changed. `write_gate` holds back every create
/// and update until a permit is added.
#[derive(Default)]
pub struct FakeBackend {
    pub records: Mutex<Vec<ProfileRecord>>,
    pub fail_reads: AtomicBool,
    pub reject_writes: AtomicBool,
    pub writes: AtomicUsize,
    pub write_attempts: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub list_gate: Mutex<Option<Arc<Semaphore>>>,
    pub write_gate: Option<Arc<Semaphore>>,
}

impl FakeBackend {
    pub fn with_records(records: Vec<ProfileRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn record(&self, id: u64) -> Option<ProfileRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == ProfileId::new(id))
            .cloned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn write_attempt_count(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    pub fn set_ticker(&self, id: u64, ticker: &str) {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.iter_mut().find(|r| r.id == ProfileId::new(id)) {
            record.data.ticker = Some(ticker.to_string());
        }
    }

    async fn wait_for_write_permit(&self) -> anyhow::Result<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.write_gate {
            gate.acquire().await?.forget();
        }
        Ok(())
    }

    fn check_write(&self) -> anyhow::Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(SyncError::BackendRejected {
                status: 500,
                detail: "write refused".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn not_found(id: ProfileId) -> anyhow::Error {
    SyncError::BackendRejected {
        status: 404,
        detail: format!("profile {id} not found"),
    }
    .into()
}

#[async_trait::async_trait]
impl ProfileBackend for FakeBackend {
    async fn list_profiles(&self) -> anyhow::Result<Vec<ProfileRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        let records = self.records.lock().unwrap().clone();
        let gate = self.list_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.acquire().await?.forget();
        }
        Ok(records)
    }

    async fn create_profile(&self, record: &ProfileRecord) -> anyhow::Result<()> {
        self.wait_for_write_permit().await?;
        self.check_write()?;
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r.id == record.id) {
            return Err(SyncError::BackendRejected {
                status: 409,
                detail: format!("profile {} exists", record.id),
            }
            .into());
        }
        records.push(record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_profile(&self, record: &ProfileRecord) -> anyhow::Result<()> {
        self.wait_for_write_permit().await?;
        self.check_write()?;
        let mut records = self.records.lock().unwrap();
        let slot = records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| not_found(record.id))?;
        *slot = record.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_profile(&self, id: ProfileId) -> anyhow::Result<()> {
        self.check_write()?;
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(not_found(id));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Answers every request with a plot tagged by ticker and mode.
///
/// With a gate, each call waits for one permit before answering, which keeps it in flight
/// for as long as a test needs.
#[derive(Default)]
pub struct FakePrediction {
    pub requests: Mutex<Vec<PredictionRequest>>,
    pub fail: AtomicBool,
    pub malformed: AtomicBool,
    pub gate: Option<Arc<Semaphore>>,
}

impl FakePrediction {
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                gate: Some(gate.clone()),
                ..Self::default()
            },
            gate,
        )
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn expected_plot(request: &PredictionRequest) -> String {
        let mode = if request.predict { "ai" } else { "base" };
        plot_json(&format!("{}-{mode}", request.company_name))
    }
}

#[async_trait::async_trait]
impl PredictionClient for FakePrediction {
    async fn predict(&self, request: &PredictionRequest) -> anyhow::Result<Prediction> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("prediction service unreachable");
        }
        if self.malformed.load(Ordering::SeqCst) {
            return Err(SyncError::malformed(
                crate::error::Service::Prediction,
                "prediction response is missing plot",
            )
            .into());
        }

        Ok(Prediction {
            plot: Self::expected_plot(request),
            risk: Some(sample_risk()),
        })
    }
}

pub struct FakeListing {
    pub body: Mutex<Result<String, String>>,
    pub calls: AtomicUsize,
}

impl FakeListing {
    pub fn ok(body: &str) -> Self {
        Self {
            body: Mutex::new(Ok(body.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            body: Mutex::new(Err(reason.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TickerListing for FakeListing {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_listing(&self) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.body.lock().unwrap() {
            Ok(body) => Ok(body.clone()),
            Err(reason) => Err(anyhow::anyhow!("{reason}")),
        }
    }
}

#[derive(Default)]
pub struct MemoryCache {
    pub entries: Mutex<HashMap<String, String>>,
    pub fail_writes: AtomicBool,
}

impl MemoryCache {
    pub fn with_entry(key: &str, value: &str) -> Self {
        let cache = Self::default();
        cache
            .entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        cache
    }

    pub fn entry(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryCache {
    async fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entry(key))
    }

    async fn store(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
