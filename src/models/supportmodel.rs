// models/supportmodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SupportStatus {
    New,
    Open,
    InProgress,
    PendingCustomer,
    PendingAdmin,
    Resolved,
    Closed,
}

impl SupportStatus {
    pub const ALL: [SupportStatus; 7] = [
        SupportStatus::New,
        SupportStatus::Open,
        SupportStatus::InProgress,
        SupportStatus::PendingCustomer,
        SupportStatus::PendingAdmin,
        SupportStatus::Resolved,
        SupportStatus::Closed,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            SupportStatus::New => "new",
            SupportStatus::Open => "open",
            SupportStatus::InProgress => "in_progress",
            SupportStatus::PendingCustomer => "pending_customer",
            SupportStatus::PendingAdmin => "pending_admin",
            SupportStatus::Resolved => "resolved",
            SupportStatus::Closed => "closed",
        }
    }

    /// Resolved and closed records are kept but no longer worked on.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SupportStatus::Resolved | SupportStatus::Closed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SupportPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl SupportPriority {
    pub fn to_str(&self) -> &'static str {
        match self {
            SupportPriority::Low => "low",
            SupportPriority::Medium => "medium",
            SupportPriority::High => "high",
            SupportPriority::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    #[serde(default, alias = "_id", alias = "userId")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// One entry of a query's response thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub message: String,
    #[serde(default, alias = "isAdmin")]
    pub is_admin: bool,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupportQuery {
    #[serde(alias = "_id")]
    pub id: String,
    pub subject: String,
    pub message: String,
    pub status: SupportStatus,
    pub priority: SupportPriority,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub customer: Customer,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub responses: Vec<QueryResponse>,
}

/// One entry of a ticket's message thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketMessage {
    pub message: String,
    #[serde(default, alias = "isAdmin")]
    pub is_admin: bool,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupportTicket {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub subject: String,
    pub status: SupportStatus,
    pub priority: SupportPriority,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub customer: Customer,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<TicketMessage>,
}

/// Shared shape of queries and tickets, so the reconciler and the panel
/// filters can treat both collections the same way.
pub trait SupportRecord: Clone {
    type Entry: Clone;

    fn id(&self) -> &str;
    fn status(&self) -> SupportStatus;
    fn set_status(&mut self, status: SupportStatus);
    fn priority(&self) -> SupportPriority;
    fn category(&self) -> &str;
    fn customer(&self) -> &Customer;
    /// Heading and body text searched by the panel.
    fn search_fields(&self) -> [&str; 2];
    fn push_entry(&mut self, entry: Self::Entry);
}

impl SupportRecord for SupportQuery {
    type Entry = QueryResponse;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> SupportStatus {
        self.status
    }

    fn set_status(&mut self, status: SupportStatus) {
        self.status = status;
    }

    fn priority(&self) -> SupportPriority {
        self.priority
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn customer(&self) -> &Customer {
        &self.customer
    }

    fn search_fields(&self) -> [&str; 2] {
        [&self.subject, &self.message]
    }

    fn push_entry(&mut self, entry: QueryResponse) {
        self.responses.push(entry);
    }
}

impl SupportRecord for SupportTicket {
    type Entry = TicketMessage;

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> SupportStatus {
        self.status
    }

    fn set_status(&mut self, status: SupportStatus) {
        self.status = status;
    }

    fn priority(&self) -> SupportPriority {
        self.priority
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn customer(&self) -> &Customer {
        &self.customer
    }

    fn search_fields(&self) -> [&str; 2] {
        [&self.title, &self.description]
    }

    fn push_entry(&mut self, entry: TicketMessage) {
        self.messages.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_accepts_backend_field_names() {
        let raw = serde_json::json!({
            "_id": "Q1",
            "subject": "Late delivery",
            "message": "Where is my order?",
            "status": "pending_customer",
            "priority": "urgent",
            "category": "shipping",
            "customer": { "name": "Ada", "email": "ada@example.com" },
            "createdAt": "2026-10-01T10:00:00Z",
            "responses": [
                { "message": "Looking into it", "isAdmin": true, "createdAt": "2026-10-01T10:05:00Z" }
            ]
        });

        let query: SupportQuery = serde_json::from_value(raw).unwrap();
        assert_eq!(query.id, "Q1");
        assert_eq!(query.status, SupportStatus::PendingCustomer);
        assert_eq!(query.priority, SupportPriority::Urgent);
        assert!(query.responses[0].is_admin);
    }

    #[test]
    fn test_status_wire_names() {
        for status in SupportStatus::ALL {
            let encoded = serde_json::to_value(status).unwrap();
            assert_eq!(encoded, serde_json::Value::String(status.to_str().to_string()));
        }
        assert!(SupportStatus::Closed.is_terminal());
        assert!(!SupportStatus::PendingAdmin.is_terminal());
    }
}
