use crate::domain::contract::PredictionRequest;
use crate::domain::profile::ProfileId;
use crate::error::{Service, SyncError};
use crate::prediction::PredictionClient;
use crate::sync::notify::{Action, Notifier};
use crate::sync::profiles::ProfileStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    Completed,
    /// A generation for this profile was already running; nothing was sent.
    AlreadyGenerating,
    /// The profile already holds a predictive plot.
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Generating,
    Done,
    /// The last attempt failed. Behaves like `Idle`: generating again is allowed.
    Failed,
}

/// Drives the per-profile predictive plot lifecycle on top of a [`ProfileStore`].
pub struct PredictionOrchestrator {
    store: Arc<ProfileStore>,
    prediction: Arc<dyn PredictionClient>,
    notifier: Notifier,
    failed: Mutex<HashSet<ProfileId>>,
}

impl PredictionOrchestrator {
    pub fn new(
        store: Arc<ProfileStore>,
        prediction: Arc<dyn PredictionClient>,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            prediction,
            notifier,
            failed: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<ProfileStore> {
        &self.store
    }

    /// Requests the predictive plot for one profile and merges it into the store.
    ///
    /// At most one request per profile is in flight; a call made while one is running
    /// returns [`GenerationOutcome::AlreadyGenerating`] without touching the network.
    pub async fn generate_predictive_plot(
        &self,
        id: ProfileId,
    ) -> Result<GenerationOutcome, SyncError> {
        let res = self.generate_inner(id).await;
        match &res {
            Ok(GenerationOutcome::Completed) => {
                self.failed_set().remove(&id);
            }
            Ok(_) => {}
            Err(err) => {
                match err {
                    SyncError::ProfileNotFound(_) => {
                        self.failed_set().remove(&id);
                    }
                    // Rejections: nothing was attempted against the services.
                    SyncError::TickerUnassigned(_)
                    | SyncError::GenerationInFlight(_)
                    | SyncError::TickerChanged(_) => {}
                    _ => {
                        self.failed_set().insert(id);
                    }
                }
                self.notifier.publish(Action::GeneratePrediction, Some(id), err);
            }
        }
        res
    }

    async fn generate_inner(&self, id: ProfileId) -> Result<GenerationOutcome, SyncError> {
        let profile = self.store.get(id).ok_or(SyncError::ProfileNotFound(id))?;
        if profile.is_generating {
            return Ok(GenerationOutcome::AlreadyGenerating);
        }
        if profile.predictive_plot.is_some() {
            return Ok(GenerationOutcome::AlreadyPresent);
        }
        let ticker = profile.ticker.ok_or(SyncError::TickerUnassigned(id))?;

        let Some(_guard) = self.store.begin_generation(id)? else {
            return Ok(GenerationOutcome::AlreadyGenerating);
        };
        tracing::info!(id = id.get(), %ticker, "generating predictive plot");

        let started = Instant::now();
        let prediction = self
            .prediction
            .predict(&PredictionRequest::predictive(&ticker))
            .await
            .map_err(|err| SyncError::classify(Service::Prediction, &err))?;

        // Deleted or changed while the request was out: merge into what is there now, and
        // never attach a plot computed for a ticker the profile no longer has.
        let mut merged = self.store.get(id).ok_or(SyncError::ProfileNotFound(id))?;
        if merged.ticker.as_deref() != Some(ticker.as_str()) {
            tracing::warn!(
                id = id.get(),
                requested = %ticker,
                current = ?merged.ticker,
                "ticker changed during generation; dropping result"
            );
            return Err(SyncError::TickerChanged(id));
        }
        merged.predictive_plot = Some(prediction.plot);
        if prediction.risk.is_some() {
            merged.risk = prediction.risk;
        }
        merged.is_ai_view_active = true;

        self.store.write_profile(&merged).await?;
        tracing::info!(
            id = id.get(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "predictive plot stored"
        );
        Ok(GenerationOutcome::Completed)
    }

    /// `None` for ids not in the store.
    pub fn state(&self, id: ProfileId) -> Option<GenerationState> {
        let Some(profile) = self.store.get(id) else {
            self.failed_set().remove(&id);
            return None;
        };
        let state = if profile.is_generating {
            GenerationState::Generating
        } else if profile.predictive_plot.is_some() {
            GenerationState::Done
        } else if self.failed_set().contains(&id) {
            GenerationState::Failed
        } else {
            GenerationState::Idle
        };
        Some(state)
    }

    /// Flips between baseline and predictive view. Local only; returns the new value.
    pub fn toggle_view(&self, id: ProfileId) -> Result<bool, SyncError> {
        self.store.toggle_view_locally(id).map_err(|err| {
            self.notifier.publish(Action::ToggleView, Some(id), &err);
            err
        })
    }

    /// True when the predictive view is selected but there is nothing to show yet.
    pub fn needs_generation(&self, id: ProfileId) -> bool {
        self.store.get(id).is_some_and(|p| {
            p.is_ai_view_active && p.predictive_plot.is_none() && !p.is_generating
        })
    }

    fn failed_set(&self) -> std::sync::MutexGuard<'_, HashSet<ProfileId>> {
        self.failed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
