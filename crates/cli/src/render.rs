use tickerdesk_core::codec::risk_intent;
use tickerdesk_core::domain::profile::Profile;
use tickerdesk_core::domain::risk::{RiskAssessment, RiskLevel};

pub fn profile_line(profile: &Profile) -> String {
    let ticker = profile.ticker.as_deref().unwrap_or("(unassigned)");
    let view = if profile.is_ai_view_active {
        "predictive"
    } else {
        "baseline"
    };

    let mut line = format!(
        "#{:<4} {:<12} view={:<10} baseline={} predictive={}",
        profile.id,
        ticker,
        view,
        yes_no(profile.baseline_plot.is_some()),
        yes_no(profile.predictive_plot.is_some()),
    );
    if let Some(risk) = &profile.risk {
        line.push_str("  risk ");
        line.push_str(&risk_summary(risk));
    }
    if profile.is_generating {
        line.push_str("  [generating]");
    }
    line
}

pub fn risk_summary(risk: &RiskAssessment) -> String {
    [
        ("1m", &risk.short_term),
        ("6m", &risk.medium_term),
        ("24m", &risk.long_term),
    ]
    .into_iter()
    .map(|(horizon, level)| format!("{horizon}={}", level_label(level.as_ref())))
    .collect::<Vec<_>>()
    .join(" ")
}

fn level_label(level: Option<&RiskLevel>) -> String {
    match level {
        Some(level) => format!("{}({})", level.as_str(), risk_intent(level).as_str()),
        None => "-".to_string(),
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}
