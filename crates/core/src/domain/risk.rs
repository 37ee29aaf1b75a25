use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Risk level for one horizon as reported by the prediction service.
///
/// Anything the service sends that is not one of the three known levels is kept verbatim in
/// `Other` so it survives a round trip through the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "String")]
pub enum RiskLevel {
    High,
    Moderate,
    Low,
    Other(String),
}

impl RiskLevel {
    pub fn as_str(&self) -> &str {
        match self {
            RiskLevel::High => "high",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Low => "low",
            RiskLevel::Other(raw) => raw,
        }
    }
}

impl From<&str> for RiskLevel {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => RiskLevel::High,
            "moderate" => RiskLevel::Moderate,
            "low" => RiskLevel::Low,
            _ => RiskLevel::Other(s.to_string()),
        }
    }
}

impl From<Value> for RiskLevel {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => RiskLevel::from(s.as_str()),
            other => RiskLevel::Other(other.to_string()),
        }
    }
}

impl From<RiskLevel> for String {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

/// Short, medium and long-term risk, keyed on the wire by the horizon length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(rename = "risk_1_month", default, skip_serializing_if = "Option::is_none")]
    pub short_term: Option<RiskLevel>,
    #[serde(rename = "risk_6_months", default, skip_serializing_if = "Option::is_none")]
    pub medium_term: Option<RiskLevel>,
    #[serde(rename = "risk_24_months", default, skip_serializing_if = "Option::is_none")]
    pub long_term: Option<RiskLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_levels_case_insensitively() {
        let risk: RiskAssessment = serde_json::from_value(json!({
            "risk_1_month": "High",
            "risk_6_months": " moderate ",
            "risk_24_months": "low",
        }))
        .unwrap();

        assert_eq!(risk.short_term, Some(RiskLevel::High));
        assert_eq!(risk.medium_term, Some(RiskLevel::Moderate));
        assert_eq!(risk.long_term, Some(RiskLevel::Low));
    }

    #[test]
    fn keeps_unknown_levels_verbatim() {
        let risk: RiskAssessment = serde_json::from_value(json!({
            "risk_1_month": "extreme",
            "risk_6_months": 3,
            "risk_24_months": null,
        }))
        .unwrap();

        assert_eq!(risk.short_term, Some(RiskLevel::Other("extreme".to_string())));
        assert_eq!(risk.medium_term, Some(RiskLevel::Other("3".to_string())));
        assert_eq!(risk.long_term, None);

        let back = serde_json::to_value(&risk).unwrap();
        assert_eq!(back, json!({"risk_1_month": "extreme", "risk_6_months": "3"}));
    }
}
