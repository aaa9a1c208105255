// error.rs
use thiserror::Error;

use crate::realtime::events::EventKind;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Session expired or invalid, please log in again")]
    Unauthorized,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Malformed {event} payload: {reason}")]
    MalformedEvent { event: String, reason: String },

    #[error("Handler for '{}' is already bound", .0.as_str())]
    HandlerAlreadyBound(EventKind),

    #[error("Session storage error: {0}")]
    Session(String),
}

impl ConsoleError {
    /// Failures that should be shown to the operator as a transient banner
    /// rather than handled inline or by forcing a new login.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConsoleError::Network(_) | ConsoleError::Api { .. } | ConsoleError::Transport(_)
        )
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(err: std::io::Error) -> Self {
        ConsoleError::Session(err.to_string())
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Session(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ConsoleError {
    fn from(err: validator::ValidationErrors) -> Self {
        ConsoleError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let api = ConsoleError::Api { status: 500, message: "boom".to_string() };
        assert!(api.is_transient());
        assert!(!ConsoleError::Unauthorized.is_transient());
        assert!(!ConsoleError::Validation("empty".to_string()).is_transient());
    }

    #[test]
    fn test_already_bound_message_names_event() {
        let err = ConsoleError::HandlerAlreadyBound(EventKind::NewTicketCreated);
        assert_eq!(err.to_string(), "Handler for 'new_ticket_created' is already bound");
    }
}
