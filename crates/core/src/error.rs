use crate::domain::profile::ProfileId;
use std::fmt;

/// The external collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Backend,
    Listing,
    Prediction,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Service::Backend => "profile backend",
            Service::Listing => "ticker listing",
            Service::Prediction => "prediction service",
        };
        f.write_str(name)
    }
}

/// Every failure the orchestration layer hands back to its callers.
///
/// All variants are recoverable: the state they leave behind is either unchanged or reverted,
/// and the user retries by re-triggering the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A collaborator was unreachable, timed out, or failed a read.
    TransientFetchFailure { service: Service, detail: String },
    /// A payload arrived but failed validation.
    MalformedResponse { service: Service, detail: String },
    /// The profile backend refused a write.
    BackendRejected { status: u16, detail: String },
    ProfileNotFound(ProfileId),
    TickerUnassigned(ProfileId),
    InvalidTicker(String),
    GenerationInFlight(ProfileId),
    /// The profile's ticker changed while its prediction was running; the result was dropped.
    TickerChanged(ProfileId),
}

impl SyncError {
    pub fn transient(service: Service, detail: impl Into<String>) -> Self {
        SyncError::TransientFetchFailure {
            service,
            detail: detail.into(),
        }
    }

    pub fn malformed(service: Service, detail: impl Into<String>) -> Self {
        SyncError::MalformedResponse {
            service,
            detail: detail.into(),
        }
    }

    /// Maps an error coming out of a client into the taxonomy.
    ///
    /// Clients that already know what went wrong return a `SyncError` inside the
    /// `anyhow::Error`; everything else is classified by the first recognizable cause.
    pub fn classify(service: Service, err: &anyhow::Error) -> Self {
        if let Some(known) = err.downcast_ref::<SyncError>() {
            return known.clone();
        }

        let detail = format!("{err:#}");
        for cause in err.chain() {
            if cause.is::<serde_json::Error>() {
                return SyncError::malformed(service, detail);
            }
            if let Some(req) = cause.downcast_ref::<reqwest::Error>() {
                if req.is_decode() {
                    return SyncError::malformed(service, detail);
                }
                return SyncError::transient(service, detail);
            }
        }
        SyncError::transient(service, detail)
    }

    /// The short category name used in logs and notices.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::TransientFetchFailure { .. } => "transient_fetch_failure",
            SyncError::MalformedResponse { .. } => "malformed_response",
            SyncError::BackendRejected { .. } => "backend_rejected",
            SyncError::ProfileNotFound(_) => "profile_not_found",
            SyncError::TickerUnassigned(_) => "ticker_unassigned",
            SyncError::InvalidTicker(_) => "invalid_ticker",
            SyncError::GenerationInFlight(_) => "generation_in_flight",
            SyncError::TickerChanged(_) => "ticker_changed",
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::TransientFetchFailure { service, detail } => {
                write!(f, "{service} unavailable: {detail}")
            }
            SyncError::MalformedResponse { service, detail } => {
                write!(f, "{service} returned an invalid payload: {detail}")
            }
            SyncError::BackendRejected { status, detail } => {
                write!(f, "profile backend rejected the write (status={status}): {detail}")
            }
            SyncError::ProfileNotFound(id) => write!(f, "profile {id} does not exist"),
            SyncError::TickerUnassigned(id) => write!(f, "profile {id} has no ticker assigned"),
            SyncError::InvalidTicker(ticker) => write!(f, "invalid ticker symbol: {ticker:?}"),
            SyncError::GenerationInFlight(id) => {
                write!(f, "a prediction is still running for profile {id}")
            }
            SyncError::TickerChanged(id) => {
                write!(f, "profile {id} changed ticker while its prediction was running")
            }
        }
    }
}

impl std::error::Error for SyncError {}
