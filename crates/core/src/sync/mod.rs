//! Client-side synchronization and orchestration across the backend, listing and prediction
//! services.

pub mod notify;
pub mod orchestrator;
pub mod profiles;
pub mod tickers;

pub use notify::{Action, Notice, Notifier};
pub use orchestrator::{GenerationOutcome, GenerationState, PredictionOrchestrator};
pub use profiles::ProfileStore;
pub use tickers::{TickerCache, TICKER_CACHE_KEY};
