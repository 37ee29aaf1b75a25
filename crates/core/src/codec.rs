//! Plot payload decoding and risk display mapping.
//!
//! Plots arrive as JSON-encoded figures with a `data` series member and a `layout` member.
//! Layout belongs to whoever renders the figure, so only the series survives decoding.

use crate::domain::risk::RiskLevel;
use serde_json::Value;

const DATA_MEMBER: &str = "data";
const LAYOUT_MEMBER: &str = "layout";

/// Decodes a serialized plot into its series data.
///
/// `None` means "nothing to draw": no plot yet (absent or blank input, not logged) or an
/// unusable payload (logged at warn level).
pub fn decode(raw: Option<&str>) -> Option<Value> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = match serde_json::from_str::<Value>(raw) {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(error = %err, payload_len = raw.len(), "plot payload is not valid JSON");
            return None;
        }
    };

    let Value::Object(mut members) = parsed else {
        tracing::warn!(payload_len = raw.len(), "plot payload is not a JSON object");
        return None;
    };

    let has_layout = members.contains_key(LAYOUT_MEMBER);
    match members.remove(DATA_MEMBER) {
        Some(data) if has_layout => Some(data),
        data => {
            tracing::warn!(
                has_data = data.is_some(),
                has_layout,
                "plot payload is missing a required member"
            );
            None
        }
    }
}

/// How a risk level should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayIntent {
    Danger,
    Warning,
    Success,
    Neutral,
}

impl DisplayIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayIntent::Danger => "danger",
            DisplayIntent::Warning => "warning",
            DisplayIntent::Success => "success",
            DisplayIntent::Neutral => "neutral",
        }
    }
}

pub fn risk_intent(level: &RiskLevel) -> DisplayIntent {
    match level {
        RiskLevel::High => DisplayIntent::Danger,
        RiskLevel::Moderate => DisplayIntent::Warning,
        RiskLevel::Low => DisplayIntent::Success,
        RiskLevel::Other(_) => DisplayIntent::Neutral,
    }
}
