// dtos/supportdtos.rs
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::supportmodel::SupportStatus;

/// Body for a new admin response (query) or message (ticket).
#[derive(Debug, Clone, Serialize, Validate)]
pub struct ThreadEntryDto {
    #[validate(length(min = 1, max = 2000, message = "Message must be between 1-2000 characters"))]
    pub message: String,
}

impl ThreadEntryDto {
    pub fn new(message: &str) -> Self {
        Self { message: message.trim().to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct UpdateQueryStatusDto {
    pub status: SupportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 2000, message = "Response must be between 1-2000 characters"))]
    pub response: Option<String>,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct UpdateTicketStatusDto {
    pub status: SupportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 2000, message = "Message must be between 1-2000 characters"))]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct LoginDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Standard `{ "data": .., "message": .. }` envelope of the admin API.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub token: String,
}

/// Trims an optional note and drops it when nothing is left.
pub fn optional_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_entry_is_trimmed_before_validation() {
        assert!(ThreadEntryDto::new("   ").validate().is_err());
        let dto = ThreadEntryDto::new("  Thanks, refunded.  ");
        assert_eq!(dto.message, "Thanks, refunded.");
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_thread_entry_length_limit() {
        assert!(ThreadEntryDto::new(&"x".repeat(2000)).validate().is_ok());
        assert!(ThreadEntryDto::new(&"x".repeat(2001)).validate().is_err());
    }

    #[test]
    fn test_status_body_serialization() {
        let dto = UpdateQueryStatusDto { status: SupportStatus::Resolved, response: None };
        assert_eq!(serde_json::to_value(&dto).unwrap(), serde_json::json!({ "status": "resolved" }));
        assert_eq!(optional_note(Some("   ")), None);
        assert_eq!(optional_note(Some(" done ")), Some("done".to_string()));
    }

    #[test]
    fn test_login_validation() {
        let dto = LoginDto { email: "admin@shop.test".to_string(), password: "secret".to_string() };
        assert!(dto.validate().is_ok());
        let bad = LoginDto { email: "not-an-email".to_string(), password: String::new() };
        assert!(bad.validate().is_err());
    }
}
