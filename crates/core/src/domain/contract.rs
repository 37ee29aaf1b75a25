//! Wire shapes exchanged with the profile backend and the prediction service.

use crate::domain::profile::ProfileId;
use crate::domain::risk::RiskAssessment;
use anyhow::ensure;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A profile exactly as the backend stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: ProfileId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: ProfileData,
}

/// The `data` member of a stored profile.
///
/// Every field except `ticker` may be absent in older records. Members this client does not
/// know about are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileData {
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictive_plot: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_risk",
        skip_serializing_if = "Option::is_none"
    )]
    pub risk_output: Option<RiskAssessment>,
    #[serde(
        rename = "isAIPlotVisible",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub is_ai_plot_visible: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_default<'de, D>(deserializer: D) -> Result<ProfileData, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ProfileData>::deserialize(deserializer)?.unwrap_or_default())
}

// Older records carry placeholders like "pending" here; those read as no assessment.
fn lenient_risk<'de, D>(deserializer: D) -> Result<Option<RiskAssessment>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| match serde_json::from_value(v) {
        Ok(risk) => Some(risk),
        Err(err) => {
            tracing::debug!(error = %err, "ignoring unreadable risk_output");
            None
        }
    }))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictionRequest {
    pub company_name: String,
    pub predict: bool,
}

impl PredictionRequest {
    pub fn baseline(ticker: &str) -> Self {
        Self {
            company_name: ticker.to_string(),
            predict: false,
        }
    }

    pub fn predictive(ticker: &str) -> Self {
        Self {
            company_name: ticker.to_string(),
            predict: true,
        }
    }
}

/// Prediction service response before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionResponse {
    #[serde(default)]
    pub plot: Option<Value>,
    #[serde(default)]
    pub risk_output: Option<RiskAssessment>,
}

/// A validated prediction: a serialized plot and its risk assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub plot: String,
    pub risk: Option<RiskAssessment>,
}

impl PredictionResponse {
    pub fn validate_and_into_prediction(self) -> anyhow::Result<Prediction> {
        let plot = match self.plot {
            Some(Value::String(s)) => s,
            // Some deployments inline the figure instead of sending it pre-encoded.
            Some(v @ Value::Object(_)) => v.to_string(),
            Some(other) => anyhow::bail!("plot must be a string or an object (got {other})"),
            None => anyhow::bail!("prediction response is missing plot"),
        };
        ensure!(!plot.trim().is_empty(), "prediction response has an empty plot");

        Ok(Prediction {
            plot,
            risk: self.risk_output,
        })
    }
}
