use crate::domain::contract::{ProfileData, ProfileRecord};
use crate::domain::risk::RiskAssessment;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(u64);

impl ProfileId {
    pub const FIRST: ProfileId = ProfileId(1);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ProfileId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(ProfileId)
    }
}

/// A profile as the rest of the application sees it: every presentation field filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: ProfileId,
    pub ticker: Option<String>,
    pub baseline_plot: Option<String>,
    pub predictive_plot: Option<String>,
    pub risk: Option<RiskAssessment>,
    pub is_ai_view_active: bool,
    pub is_generating: bool,
    extra: Map<String, Value>,
}

impl Profile {
    /// A fresh, unassigned profile.
    pub fn new(id: ProfileId) -> Self {
        Self {
            id,
            ticker: None,
            baseline_plot: None,
            predictive_plot: None,
            risk: None,
            is_ai_view_active: false,
            is_generating: false,
            extra: Map::new(),
        }
    }

    /// Migrates a possibly-partial stored record into the complete in-memory shape.
    ///
    /// This is the only place defaults for missing persisted fields are decided. Blank
    /// strings count as absent. `is_generating` is never persisted and always starts false.
    pub fn from_record(record: ProfileRecord) -> Self {
        let ProfileData {
            ticker,
            plot,
            predictive_plot,
            risk_output,
            is_ai_plot_visible,
            extra,
        } = record.data;

        Self {
            id: record.id,
            ticker: non_blank(ticker).map(|t| t.trim().to_string()),
            baseline_plot: non_blank(plot),
            predictive_plot: non_blank(predictive_plot),
            risk: risk_output,
            is_ai_view_active: is_ai_plot_visible.unwrap_or(false),
            is_generating: false,
            extra,
        }
    }

    pub fn to_record(&self) -> ProfileRecord {
        ProfileRecord {
            id: self.id,
            data: ProfileData {
                ticker: Some(self.ticker.clone().unwrap_or_default()),
                plot: self.baseline_plot.clone(),
                predictive_plot: self.predictive_plot.clone(),
                risk_output: self.risk.clone(),
                is_ai_plot_visible: Some(self.is_ai_view_active),
                extra: self.extra.clone(),
            },
        }
    }

    pub fn has_ticker(&self) -> bool {
        self.ticker.is_some()
    }

    /// The plot matching the current view toggle, if it has been fetched.
    pub fn visible_plot(&self) -> Option<&str> {
        if self.is_ai_view_active {
            self.predictive_plot.as_deref()
        } else {
            self.baseline_plot.as_deref()
        }
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

/// Unassigned profiles first, backend order preserved within each group.
pub fn sort_for_presentation(profiles: &mut [Profile]) {
    // `sort_by_key` is stable.
    profiles.sort_by_key(Profile::has_ticker);
}

/// An immutable view of the whole collection at one version.
#[derive(Debug, Clone)]
pub struct ProfileSnapshot {
    version: u64,
    profiles: Arc<[Profile]>,
}

impl Default for ProfileSnapshot {
    fn default() -> Self {
        Self::new(0, Vec::new())
    }
}

impl ProfileSnapshot {
    pub(crate) fn new(version: u64, profiles: Vec<Profile>) -> Self {
        Self {
            version,
            profiles: profiles.into(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn get(&self, id: ProfileId) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn ids(&self) -> Vec<ProfileId> {
        self.profiles.iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
