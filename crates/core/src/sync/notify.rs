use crate::domain::profile::ProfileId;
use crate::error::SyncError;
use std::fmt;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

/// The user action a notice belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    FetchTickers,
    SyncProfiles,
    CreateProfile,
    DeleteProfile,
    AssignTicker,
    GeneratePrediction,
    ToggleView,
}

impl Action {
    fn user_message(self) -> &'static str {
        match self {
            Action::FetchTickers => "Cannot fetch tickers",
            Action::SyncProfiles => "Cannot fetch profiles",
            Action::CreateProfile => "Error creating profile. Please try again.",
            Action::DeleteProfile => "Error deleting profile. Please try again.",
            Action::AssignTicker => "Error updating ticker. Please try again.",
            Action::GeneratePrediction => "Error generating prediction. Please try again.",
            Action::ToggleView => "Cannot switch plot view",
        }
    }
}

/// One failed action, as shown to the user.
#[derive(Debug, Clone)]
pub struct Notice {
    pub action: Action,
    pub profile: Option<ProfileId>,
    pub error: SyncError,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.profile {
            Some(id) => write!(f, "{} (profile {id}: {})", self.action.user_message(), self.error),
            None => write!(f, "{} ({})", self.action.user_message(), self.error),
        }
    }
}

/// Fan-out of failure notices to whoever presents them.
///
/// Publishing never blocks and never fails; with no subscriber the notice is only logged.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn publish(&self, action: Action, profile: Option<ProfileId>, error: &SyncError) {
        tracing::warn!(
            ?action,
            profile = profile.map(ProfileId::get),
            kind = error.kind(),
            error = %error,
            "action failed"
        );
        let _ = self.tx.send(Notice {
            action,
            profile,
            error: error.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_notices() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();

        notifier.publish(
            Action::DeleteProfile,
            Some(ProfileId::new(3)),
            &SyncError::BackendRejected {
                status: 404,
                detail: "Not Found".to_string(),
            },
        );

        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.action, Action::DeleteProfile);
        assert_eq!(notice.profile, Some(ProfileId::new(3)));
        assert!(notice
            .to_string()
            .starts_with("Error deleting profile. Please try again. (profile 3:"));
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let notifier = Notifier::new(0);
        notifier.publish(Action::FetchTickers, None, &SyncError::InvalidTicker(String::new()));
    }
}
