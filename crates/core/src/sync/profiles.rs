use crate::backend::ProfileBackend;
use crate::domain::contract::PredictionRequest;
use crate::domain::profile::{sort_for_presentation, Profile, ProfileId, ProfileSnapshot};
use crate::error::{Service, SyncError};
use crate::prediction::PredictionClient;
use crate::sync::notify::{Action, Notifier};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// The authoritative in-memory profile collection, mirrored from the backend.
///
/// Readers get immutable [`ProfileSnapshot`]s; every change is published as a whole new
/// snapshot, so a partially merged collection is never observable.
pub struct ProfileStore {
    backend: Arc<dyn ProfileBackend>,
    prediction: Arc<dyn PredictionClient>,
    notifier: Notifier,
    inner: Mutex<Inner>,
    tx: watch::Sender<ProfileSnapshot>,
}

#[derive(Default)]
struct Inner {
    profiles: Vec<Profile>,
    version: u64,
    // Highest id ever seen or handed out this session.
    high_water: Option<ProfileId>,
    generating: HashSet<ProfileId>,
    // Assignments in progress, counted per profile.
    assigning: HashMap<ProfileId, usize>,
    // Local view toggles not yet written to the backend.
    view_overrides: HashMap<ProfileId, bool>,
    // Sync responses can resolve out of order; only the newest request may publish.
    sync_issued: u64,
    sync_applied: u64,
}

impl ProfileStore {
    pub fn new(
        backend: Arc<dyn ProfileBackend>,
        prediction: Arc<dyn PredictionClient>,
        notifier: Notifier,
    ) -> Self {
        let (tx, _) = watch::channel(ProfileSnapshot::default());
        Self {
            backend,
            prediction,
            notifier,
            inner: Mutex::new(Inner::default()),
            tx,
        }
    }

    pub fn list(&self) -> ProfileSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProfileSnapshot> {
        self.tx.subscribe()
    }

    pub fn get(&self, id: ProfileId) -> Option<Profile> {
        self.tx.borrow().get(id).cloned()
    }

    pub fn is_generating(&self, id: ProfileId) -> bool {
        self.lock().generating.contains(&id)
    }

    /// Replaces the collection with the backend's current state.
    pub async fn sync(&self) -> Result<ProfileSnapshot, SyncError> {
        let ticket = {
            let mut inner = self.lock();
            inner.sync_issued += 1;
            inner.sync_issued
        };

        let records = match self.backend.list_profiles().await {
            Ok(records) => records,
            Err(err) => {
                let err = SyncError::classify(Service::Backend, &err);
                self.notifier.publish(Action::SyncProfiles, None, &err);
                return Err(err);
            }
        };

        let mut seen = HashSet::with_capacity(records.len());
        let mut profiles = Vec::with_capacity(records.len());
        for record in records {
            if !seen.insert(record.id) {
                tracing::warn!(
                    id = record.id.get(),
                    "backend returned a duplicate profile id; keeping the first"
                );
                continue;
            }
            profiles.push(Profile::from_record(record));
        }
        sort_for_presentation(&mut profiles);

        let mut inner = self.lock();
        if ticket < inner.sync_applied {
            tracing::debug!(ticket, applied = inner.sync_applied, "discarding stale profile sync");
            return Ok(self.list());
        }
        inner.sync_applied = ticket;
        if let Some(max) = profiles.iter().map(|p| p.id).max() {
            inner.high_water = inner.high_water.max(Some(max));
        }
        inner.profiles = profiles;
        Ok(self.publish(&mut inner))
    }

    /// Creates an empty profile under a fresh id, then re-syncs.
    pub async fn create(&self) -> Result<Profile, SyncError> {
        let id = self.allocate_id();
        let profile = Profile::new(id);

        if let Err(err) = self.backend.create_profile(&profile.to_record()).await {
            let err = SyncError::classify(Service::Backend, &err);
            self.notifier.publish(Action::CreateProfile, Some(id), &err);
            return Err(err);
        }
        tracing::info!(id = id.get(), "profile created");

        self.resync_after_write().await;
        Ok(self.get(id).unwrap_or(profile))
    }

    pub async fn delete(&self, id: ProfileId) -> Result<(), SyncError> {
        if let Err(err) = self.backend.delete_profile(id).await {
            let err = SyncError::classify(Service::Backend, &err);
            self.notifier.publish(Action::DeleteProfile, Some(id), &err);
            return Err(err);
        }
        tracing::info!(id = id.get(), "profile deleted");

        self.lock().view_overrides.remove(&id);
        self.resync_after_write().await;
        Ok(())
    }

    /// Binds `ticker` to a profile: baseline prediction, merge, persist, re-sync.
    ///
    /// All-or-nothing: if the prediction or the write fails, neither the backend nor the local
    /// collection changes. Reassigning replaces the baseline and drops any predictive plot.
    pub async fn assign_ticker(&self, id: ProfileId, ticker: &str) -> Result<Profile, SyncError> {
        let res = self.assign_ticker_inner(id, ticker).await;
        if let Err(err) = &res {
            self.notifier.publish(Action::AssignTicker, Some(id), err);
        }
        res
    }

    async fn assign_ticker_inner(&self, id: ProfileId, ticker: &str) -> Result<Profile, SyncError> {
        let ticker = ticker.trim();
        if ticker.is_empty() || ticker.contains(char::is_whitespace) {
            return Err(SyncError::InvalidTicker(ticker.to_string()));
        }
        // Held until the write and re-sync are done, so no generation can start on the old
        // ticker and write it back over this assignment.
        let _assignment = self.begin_assignment(id)?;

        let prediction = self
            .prediction
            .predict(&PredictionRequest::baseline(ticker))
            .await
            .map_err(|err| SyncError::classify(Service::Prediction, &err))?;

        // Merge into the latest copy, not the one seen before the call.
        let mut merged = self.get(id).ok_or(SyncError::ProfileNotFound(id))?;
        merged.ticker = Some(ticker.to_string());
        merged.baseline_plot = Some(prediction.plot);
        merged.risk = prediction.risk;
        merged.predictive_plot = None;
        merged.is_ai_view_active = false;

        self.write_profile(&merged).await?;
        tracing::info!(id = id.get(), %ticker, "ticker assigned");
        Ok(self.get(id).unwrap_or(merged))
    }

    fn begin_assignment(&self, id: ProfileId) -> Result<AssignmentGuard<'_>, SyncError> {
        let mut inner = self.lock();
        if !inner.profiles.iter().any(|p| p.id == id) {
            return Err(SyncError::ProfileNotFound(id));
        }
        if inner.generating.contains(&id) {
            return Err(SyncError::GenerationInFlight(id));
        }
        *inner.assigning.entry(id).or_default() += 1;
        Ok(AssignmentGuard { store: self, id })
    }

    fn end_assignment(&self, id: ProfileId) {
        let mut inner = self.lock();
        let finished = match inner.assigning.get_mut(&id) {
            Some(count) => {
                *count -= 1;
                *count == 0
            }
            None => false,
        };
        if finished {
            inner.assigning.remove(&id);
        }
    }

    /// PUTs a merged profile and re-syncs.
    ///
    /// If the follow-up sync fails the accepted write is applied locally so the collection
    /// still reflects what the backend holds.
    pub(crate) async fn write_profile(&self, profile: &Profile) -> Result<(), SyncError> {
        self.backend
            .update_profile(&profile.to_record())
            .await
            .map_err(|err| SyncError::classify(Service::Backend, &err))?;

        self.lock().view_overrides.remove(&profile.id);
        if self.sync().await.is_err() {
            let mut inner = self.lock();
            if let Some(slot) = inner.profiles.iter_mut().find(|p| p.id == profile.id) {
                *slot = profile.clone();
                sort_for_presentation(&mut inner.profiles);
                self.publish(&mut inner);
            }
        }
        Ok(())
    }

    /// Marks a profile as generating. `Ok(None)` when a generation is already in flight.
    ///
    /// Fails with [`SyncError::GenerationInFlight`] while a ticker assignment for the profile
    /// is still running.
    pub(crate) fn begin_generation(
        &self,
        id: ProfileId,
    ) -> Result<Option<GenerationGuard<'_>>, SyncError> {
        let mut inner = self.lock();
        if !inner.profiles.iter().any(|p| p.id == id) {
            return Err(SyncError::ProfileNotFound(id));
        }
        if inner.assigning.contains_key(&id) {
            return Err(SyncError::GenerationInFlight(id));
        }
        if !inner.generating.insert(id) {
            return Ok(None);
        }
        self.publish(&mut inner);
        Ok(Some(GenerationGuard { store: self, id }))
    }

    fn end_generation(&self, id: ProfileId) {
        let mut inner = self.lock();
        if inner.generating.remove(&id) {
            self.publish(&mut inner);
        }
    }

    /// Flips the view toggle locally and returns the new value. Nothing is written.
    pub(crate) fn toggle_view_locally(&self, id: ProfileId) -> Result<bool, SyncError> {
        let mut inner = self.lock();
        let current = inner
            .profiles
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.is_ai_view_active)
            .ok_or(SyncError::ProfileNotFound(id))?;
        inner.view_overrides.insert(id, !current);
        self.publish(&mut inner);
        Ok(!current)
    }

    async fn resync_after_write(&self) {
        // A failed sync has already been reported; the write itself stands.
        let _ = self.sync().await;
    }

    fn allocate_id(&self) -> ProfileId {
        let mut inner = self.lock();
        let current_max = inner.profiles.iter().map(|p| p.id).max();
        let id = match inner.high_water.max(current_max) {
            Some(max) => max.next(),
            None => ProfileId::FIRST,
        };
        inner.high_water = Some(id);
        id
    }

    fn publish(&self, inner: &mut Inner) -> ProfileSnapshot {
        let Inner {
            profiles,
            generating,
            view_overrides,
            ..
        } = &mut *inner;
        for p in profiles.iter_mut() {
            p.is_generating = generating.contains(&p.id);
            if let Some(&active) = view_overrides.get(&p.id) {
                p.is_ai_view_active = active;
            }
        }

        inner.version += 1;
        let snapshot = ProfileSnapshot::new(inner.version, inner.profiles.clone());
        self.tx.send_replace(snapshot.clone());
        snapshot
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight flag of one profile when dropped, whatever way generation ends.
pub(crate) struct GenerationGuard<'a> {
    store: &'a ProfileStore,
    id: ProfileId,
}

impl Drop for GenerationGuard<'_> {
    fn drop(&mut self) {
        self.store.end_generation(self.id);
    }
}

struct AssignmentGuard<'a> {
    store: &'a ProfileStore,
    id: ProfileId,
}

impl Drop for AssignmentGuard<'_> {
    fn drop(&mut self) {
        self.store.end_assignment(self.id);
    }
}
