use crate::config::Settings;
use crate::domain::contract::{Prediction, PredictionRequest, PredictionResponse};
use crate::error::{Service, SyncError};
use crate::prediction::PredictionClient;
use anyhow::Context;
use std::time::Duration;

const PREDICT_PATH: &str = "/api/main";

#[derive(Debug, Clone)]
pub struct HttpPredictionClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPredictionClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Self::new(&settings.prediction_service_url, settings.prediction_timeout)
    }

    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build prediction http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self) -> String {
        format!("{}{PREDICT_PATH}", self.base_url)
    }
}

#[async_trait::async_trait]
impl PredictionClient for HttpPredictionClient {
    async fn predict(&self, request: &PredictionRequest) -> anyhow::Result<Prediction> {
        let started = std::time::Instant::now();
        let res = self
            .http
            .post(self.url())
            .json(request)
            .send()
            .await
            .with_context(|| format!("prediction request for {} failed", request.company_name))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read prediction response body")?;
        if !status.is_success() {
            return Err(SyncError::transient(
                Service::Prediction,
                format!("HTTP {status} for {}", request.company_name),
            )
            .into());
        }

        let parsed = serde_json::from_str::<PredictionResponse>(&text).map_err(|err| {
            SyncError::malformed(Service::Prediction, format!("response body: {err}"))
        })?;
        let prediction = parsed
            .validate_and_into_prediction()
            .map_err(|err| SyncError::malformed(Service::Prediction, format!("{err:#}")))?;

        tracing::debug!(
            ticker = %request.company_name,
            predict = request.predict,
            plot_len = prediction.plot.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "prediction received"
        );
        Ok(prediction)
    }
}
