//! User-facing rendering of turn failures.

use crate::error::{Error, ErrorKind};

/// Follow-up the UI can offer alongside a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeAction {
    /// Send the user to the subscription page
    Upgrade,
    /// Let the user resubmit the turn
    TryAgain,
}

/// A classified, displayable failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub action: Option<NoticeAction>,
}

impl Notice {
    fn new(title: &str, description: impl Into<String>, action: Option<NoticeAction>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            action,
        }
    }
}

impl Error {
    /// Converts the error into the notice shown to the user
    ///
    /// Insufficient credits carry the upgrade path, connection failures carry a
    /// retry affordance, safety blocks are surfaced verbatim, and everything
    /// else collapses into a generic failure.
    pub fn notice(&self) -> Notice {
        match self.kind() {
            ErrorKind::InsufficientCredits => Notice::new(
                "Insufficient Credits",
                format!("{self}. Upgrade to Premium for unlimited messages!"),
                Some(NoticeAction::Upgrade),
            ),
            ErrorKind::Connection => Notice::new(
                "Connection Error",
                "Unable to connect to the AI service. Please check your internet connection and try again.",
                Some(NoticeAction::TryAgain),
            ),
            ErrorKind::ContentSafety => Notice::new(
                "Message Blocked",
                "The message was blocked due to safety concerns. Please try rephrasing your request.",
                None,
            ),
            ErrorKind::Validation | ErrorKind::Configuration => {
                Notice::new("Error", self.to_string(), None)
            }
            ErrorKind::EmptyResponse | ErrorKind::Persistence | ErrorKind::Unknown => {
                Notice::new("Error", "An unexpected error occurred", None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GenerationError, StoreError};

    #[test]
    fn test_insufficient_credits_offers_upgrade() {
        let notice = Error::InsufficientCredits {
            required: 2,
            available: 0,
        }
        .notice();
        assert_eq!(notice.title, "Insufficient Credits");
        assert_eq!(notice.action, Some(NoticeAction::Upgrade));
        assert!(notice.description.contains("You need 2 credits"));
        assert!(notice.description.ends_with("Upgrade to Premium for unlimited messages!"));
    }

    #[test]
    fn test_connection_error_offers_retry() {
        let err: Error = GenerationError::NetworkFailure {
            attempts: 3,
            message: "connect refused".into(),
        }
        .into();
        let notice = err.notice();
        assert_eq!(notice.title, "Connection Error");
        assert_eq!(notice.action, Some(NoticeAction::TryAgain));
    }

    #[test]
    fn test_persistence_is_generic() {
        let err: Error = StoreError::Backend("insert failed".into()).into();
        let notice = err.notice();
        assert_eq!(notice.title, "Error");
        assert_eq!(notice.description, "An unexpected error occurred");
        assert_eq!(notice.action, None);
    }
}
