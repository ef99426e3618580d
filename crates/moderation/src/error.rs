//! Moderation error type
//!
//! Every service in this crate reports failures through [`ModerationError`].
//! Transport failures keep the server's message untouched so the presentation
//! layer can show it verbatim.

use api_client::ApiError;
use thiserror::Error;

/// Errors that can occur during moderation operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModerationError {
    /// No authenticated user in the session
    #[error("Not logged in")]
    NotLoggedIn,

    /// The actor lacks the right or the target does not admit the action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The target is a protected principal (e.g. root)
    #[error("{0}")]
    ProtectedPrincipal(String),

    /// The actor targeted themself
    #[error("You cannot moderate yourself")]
    SelfTarget,

    /// The relationship already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The relationship or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request rejected before it was sent
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network or server failure, carrying the server message
    #[error("{0}")]
    Transport(String),
}

impl ModerationError {
    /// Message suitable for an error toast
    ///
    /// Server and policy messages are returned without the variant prefix.
    pub fn user_message(&self) -> String {
        match self {
            ModerationError::Forbidden(m)
            | ModerationError::ProtectedPrincipal(m)
            | ModerationError::Conflict(m)
            | ModerationError::NotFound(m)
            | ModerationError::InvalidInput(m)
            | ModerationError::Transport(m) => m.clone(),
            other => other.to_string(),
        }
    }
}

impl From<ApiError> for ModerationError {
    fn from(err: ApiError) -> Self {
        let message = err.message().to_string();
        match err.status() {
            403 => ModerationError::Forbidden(message),
            404 => ModerationError::NotFound(message),
            409 => ModerationError::Conflict(message),
            _ => ModerationError::Transport(message),
        }
    }
}

impl From<serde_json::Error> for ModerationError {
    fn from(err: serde_json::Error) -> Self {
        ModerationError::Transport(format!("Invalid response: {}", err))
    }
}

/// Result type for moderation operations
pub type Result<T> = std::result::Result<T, ModerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_mapping() {
        let err: ModerationError = ApiError::new(404, "NotFound", "Server block not found").into();
        assert_eq!(err, ModerationError::NotFound("Server block not found".to_string()));

        let err: ModerationError = ApiError::new(409, "Conflict", "Already blocked").into();
        assert_eq!(err, ModerationError::Conflict("Already blocked".to_string()));

        let err: ModerationError = ApiError::new(403, "Forbidden", "Missing right").into();
        assert!(matches!(err, ModerationError::Forbidden(_)));
    }

    #[test]
    fn test_transport_message_unchanged() {
        let err: ModerationError =
            ApiError::new(500, "Unknown", "Cannot delete user: database is locked").into();
        assert_eq!(err.user_message(), "Cannot delete user: database is locked");

        let err: ModerationError = ApiError::new(0, "NetworkError", "Request failed: timeout").into();
        assert_eq!(err, ModerationError::Transport("Request failed: timeout".to_string()));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(ModerationError::NotLoggedIn.to_string(), "Not logged in");
        assert_eq!(
            ModerationError::ProtectedPrincipal("You cannot delete root.".to_string()).to_string(),
            "You cannot delete root."
        );
        assert!(ModerationError::Conflict("x".to_string()).to_string().contains("Conflict"));
    }

    #[test]
    fn test_user_message_drops_prefix() {
        let err = ModerationError::NotFound("Block not found".to_string());
        assert_eq!(err.user_message(), "Block not found");
        assert_eq!(ModerationError::NotLoggedIn.user_message(), "Not logged in");
    }
}
