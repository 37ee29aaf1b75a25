pub mod http;

use crate::domain::contract::{Prediction, PredictionRequest};

pub use http::HttpPredictionClient;

#[async_trait::async_trait]
pub trait PredictionClient: Send + Sync {
    /// Runs the model for one ticker. `request.predict` selects the baseline or the
    /// AI-predicted plot.
    async fn predict(&self, request: &PredictionRequest) -> anyhow::Result<Prediction>;
}
