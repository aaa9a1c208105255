// realtime/commands.rs
use serde::Serialize;

use crate::models::{chatmodels::MessageType, supportmodel::SupportStatus};

/// Commands sent from the console to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundCommand {
    #[serde(rename = "join_room")]
    JoinRoom { room_id: String },

    #[serde(rename = "send_message")]
    SendMessage {
        room_id: String,
        message: String,
        #[serde(rename = "type")]
        message_type: MessageType,
    },

    #[serde(rename = "typing_start")]
    TypingStart { room_id: String },

    #[serde(rename = "typing_stop")]
    TypingStop { room_id: String },

    #[serde(rename = "mark_messages_read")]
    MarkRead { room_id: String },

    #[serde(rename = "update_query_status")]
    UpdateQueryStatus {
        query_id: String,
        status: SupportStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<String>,
    },

    #[serde(rename = "update_ticket_status")]
    UpdateTicketStatus {
        ticket_id: String,
        status: SupportStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "ping")]
    Ping,
}

impl OutboundCommand {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundCommand::JoinRoom { .. } => "join_room",
            OutboundCommand::SendMessage { .. } => "send_message",
            OutboundCommand::TypingStart { .. } => "typing_start",
            OutboundCommand::TypingStop { .. } => "typing_stop",
            OutboundCommand::MarkRead { .. } => "mark_messages_read",
            OutboundCommand::UpdateQueryStatus { .. } => "update_query_status",
            OutboundCommand::UpdateTicketStatus { .. } => "update_ticket_status",
            OutboundCommand::Ping => "ping",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_message_frame() {
        let cmd = OutboundCommand::SendMessage {
            room_id: "room-7".to_string(),
            message: "Hello".to_string(),
            message_type: MessageType::default(),
        };
        let frame = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            frame,
            serde_json::json!({
                "event": "send_message",
                "data": { "room_id": "room-7", "message": "Hello", "type": "text" }
            })
        );
        assert_eq!(frame["event"], cmd.name());
    }

    #[test]
    fn test_status_update_omits_missing_body() {
        let cmd = OutboundCommand::UpdateQueryStatus {
            query_id: "Q1".to_string(),
            status: SupportStatus::Resolved,
            response: None,
        };
        let frame = serde_json::to_value(&cmd).unwrap();
        assert_eq!(frame["data"], serde_json::json!({ "query_id": "Q1", "status": "resolved" }));
    }

    #[test]
    fn test_ping_has_no_payload() {
        let frame = serde_json::to_value(OutboundCommand::Ping).unwrap();
        assert_eq!(frame, serde_json::json!({ "event": "ping" }));
    }
}
