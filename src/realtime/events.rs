// realtime/events.rs
//! Inbound event types. Every frame the server pushes is validated here and
//! turned into an [`InboundEvent`] before any handler sees it.

use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    error::ConsoleError,
    models::{
        chatmodels::{ChatMessage, RoomParticipant},
        supportmodel::{QueryResponse, SupportQuery, SupportTicket, TicketMessage},
    },
};

/// Text frame envelope used in both directions.
#[derive(Debug, Deserialize)]
pub struct WireFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Connect,
    Disconnect,
    ConnectError,
    Error,
    NewMessage,
    UserJoined,
    UserLeft,
    TypingStart,
    TypingStop,
    MessagesRead,
    RoomJoined,
    Pong,
    NewQueryCreated,
    NewTicketCreated,
    UserQueryResponse,
    UserTicketMessage,
}

impl EventKind {
    pub const ALL: [EventKind; 16] = [
        EventKind::Connect,
        EventKind::Disconnect,
        EventKind::ConnectError,
        EventKind::Error,
        EventKind::NewMessage,
        EventKind::UserJoined,
        EventKind::UserLeft,
        EventKind::TypingStart,
        EventKind::TypingStop,
        EventKind::MessagesRead,
        EventKind::RoomJoined,
        EventKind::Pong,
        EventKind::NewQueryCreated,
        EventKind::NewTicketCreated,
        EventKind::UserQueryResponse,
        EventKind::UserTicketMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::ConnectError => "connect_error",
            EventKind::Error => "error",
            EventKind::NewMessage => "new_message",
            EventKind::UserJoined => "user_joined",
            EventKind::UserLeft => "user_left",
            EventKind::TypingStart => "typing_start",
            EventKind::TypingStop => "typing_stop",
            EventKind::MessagesRead => "messages_read",
            EventKind::RoomJoined => "room_joined",
            EventKind::Pong => "pong",
            EventKind::NewQueryCreated => "new_query_created",
            EventKind::NewTicketCreated => "new_ticket_created",
            EventKind::UserQueryResponse => "user_query_response",
            EventKind::UserTicketMessage => "user_ticket_message",
        }
    }

    pub fn from_name(name: &str) -> Option<EventKind> {
        EventKind::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Lifecycle events are produced by the connection manager itself and
    /// are never accepted from the wire.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            EventKind::Connect | EventKind::Disconnect | EventKind::ConnectError
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypingIndicator {
    #[serde(alias = "userId")]
    pub user_id: String,
    pub room: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadReceipt {
    pub room: String,
    #[serde(alias = "readerId", alias = "userId")]
    pub reader_id: String,
}

#[derive(Debug, Deserialize)]
struct NewQueryPayload {
    query: SupportQuery,
}

#[derive(Debug, Deserialize)]
struct NewTicketPayload {
    ticket: SupportTicket,
}

#[derive(Debug, Deserialize)]
struct QueryResponsePayload {
    #[serde(alias = "queryId")]
    query_id: String,
    response: QueryResponse,
}

#[derive(Debug, Deserialize)]
struct TicketMessagePayload {
    #[serde(alias = "ticketId")]
    ticket_id: String,
    message: TicketMessage,
}

#[derive(Debug, Deserialize)]
struct RoomJoinedPayload {
    #[serde(alias = "roomId", alias = "room")]
    room_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Connect,
    Disconnect { reason: String },
    ConnectError { error: String },
    Error { error: String },
    NewMessage(ChatMessage),
    UserJoined(RoomParticipant),
    UserLeft(RoomParticipant),
    TypingStart(TypingIndicator),
    TypingStop(TypingIndicator),
    MessagesRead(ReadReceipt),
    RoomJoined { room_id: String },
    Pong,
    NewQueryCreated(SupportQuery),
    NewTicketCreated(SupportTicket),
    UserQueryResponse { query_id: String, response: QueryResponse },
    UserTicketMessage { ticket_id: String, message: TicketMessage },
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::Connect => EventKind::Connect,
            InboundEvent::Disconnect { .. } => EventKind::Disconnect,
            InboundEvent::ConnectError { .. } => EventKind::ConnectError,
            InboundEvent::Error { .. } => EventKind::Error,
            InboundEvent::NewMessage(_) => EventKind::NewMessage,
            InboundEvent::UserJoined(_) => EventKind::UserJoined,
            InboundEvent::UserLeft(_) => EventKind::UserLeft,
            InboundEvent::TypingStart(_) => EventKind::TypingStart,
            InboundEvent::TypingStop(_) => EventKind::TypingStop,
            InboundEvent::MessagesRead(_) => EventKind::MessagesRead,
            InboundEvent::RoomJoined { .. } => EventKind::RoomJoined,
            InboundEvent::Pong => EventKind::Pong,
            InboundEvent::NewQueryCreated(_) => EventKind::NewQueryCreated,
            InboundEvent::NewTicketCreated(_) => EventKind::NewTicketCreated,
            InboundEvent::UserQueryResponse { .. } => EventKind::UserQueryResponse,
            InboundEvent::UserTicketMessage { .. } => EventKind::UserTicketMessage,
        }
    }

    /// Parses one text frame. `Ok(None)` means the frame names an event this
    /// console does not subscribe to.
    pub fn from_text(text: &str) -> Result<Option<InboundEvent>, ConsoleError> {
        let frame: WireFrame = serde_json::from_str(text).map_err(|e| ConsoleError::MalformedEvent {
            event: "<frame>".to_string(),
            reason: e.to_string(),
        })?;
        InboundEvent::from_frame(frame)
    }

    pub fn from_frame(frame: WireFrame) -> Result<Option<InboundEvent>, ConsoleError> {
        let kind = match EventKind::from_name(&frame.event) {
            Some(kind) if !kind.is_lifecycle() => kind,
            _ => return Ok(None),
        };
        let data = frame.data;

        let event = match kind {
            EventKind::Error => InboundEvent::Error { error: describe(&data) },
            EventKind::NewMessage => InboundEvent::NewMessage(payload(kind, data)?),
            EventKind::UserJoined => InboundEvent::UserJoined(payload(kind, data)?),
            EventKind::UserLeft => InboundEvent::UserLeft(payload(kind, data)?),
            EventKind::TypingStart => InboundEvent::TypingStart(payload(kind, data)?),
            EventKind::TypingStop => InboundEvent::TypingStop(payload(kind, data)?),
            EventKind::MessagesRead => InboundEvent::MessagesRead(payload(kind, data)?),
            EventKind::RoomJoined => {
                let body: RoomJoinedPayload = payload(kind, data)?;
                InboundEvent::RoomJoined { room_id: body.room_id }
            }
            EventKind::Pong => InboundEvent::Pong,
            EventKind::NewQueryCreated => {
                let body: NewQueryPayload = payload(kind, data)?;
                InboundEvent::NewQueryCreated(body.query)
            }
            EventKind::NewTicketCreated => {
                let body: NewTicketPayload = payload(kind, data)?;
                InboundEvent::NewTicketCreated(body.ticket)
            }
            EventKind::UserQueryResponse => {
                let body: QueryResponsePayload = payload(kind, data)?;
                InboundEvent::UserQueryResponse {
                    query_id: body.query_id,
                    response: body.response,
                }
            }
            EventKind::UserTicketMessage => {
                let body: TicketMessagePayload = payload(kind, data)?;
                InboundEvent::UserTicketMessage {
                    ticket_id: body.ticket_id,
                    message: body.message,
                }
            }
            EventKind::Connect | EventKind::Disconnect | EventKind::ConnectError => {
                return Ok(None)
            }
        };

        Ok(Some(event))
    }
}

fn payload<T: DeserializeOwned>(kind: EventKind, data: serde_json::Value) -> Result<T, ConsoleError> {
    serde_json::from_value(data).map_err(|e| ConsoleError::MalformedEvent {
        event: kind.as_str().to_string(),
        reason: e.to_string(),
    })
}

// Server errors arrive either as a bare string or as `{ "message": .. }`.
fn describe(data: &serde_json::Value) -> String {
    match data {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "unknown error".to_string(),
        other => other["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_name("order_created"), None);
    }

    #[test]
    fn test_new_ticket_created_frame() {
        let text = r#"{
            "event": "new_ticket_created",
            "data": { "ticket": {
                "_id": "T1", "title": "Refund", "description": "Item damaged",
                "status": "new", "priority": "high",
                "createdAt": "2026-10-02T08:00:00Z"
            } }
        }"#;

        let event = InboundEvent::from_text(text).unwrap().unwrap();
        match event {
            InboundEvent::NewTicketCreated(ticket) => {
                assert_eq!(ticket.id, "T1");
                assert!(ticket.messages.is_empty());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_created_event_without_entity_is_rejected() {
        let text = r#"{ "event": "new_query_created", "data": { "message": "no query here" } }"#;
        let err = InboundEvent::from_text(text).unwrap_err();
        assert!(matches!(err, ConsoleError::MalformedEvent { ref event, .. } if event == "new_query_created"));
    }

    #[test]
    fn test_unknown_and_lifecycle_names_are_ignored() {
        assert_eq!(InboundEvent::from_text(r#"{"event":"price_changed","data":{}}"#).unwrap(), None);
        assert_eq!(InboundEvent::from_text(r#"{"event":"connect"}"#).unwrap(), None);
    }

    #[test]
    fn test_error_payload_shapes() {
        let bare = InboundEvent::from_text(r#"{"event":"error","data":"room full"}"#).unwrap();
        assert_eq!(bare, Some(InboundEvent::Error { error: "room full".to_string() }));

        let object = InboundEvent::from_text(r#"{"event":"error","data":{"message":"forbidden"}}"#).unwrap();
        assert_eq!(object, Some(InboundEvent::Error { error: "forbidden".to_string() }));
    }

    #[test]
    fn test_user_query_response_accepts_camel_case_ids() {
        let text = r#"{
            "event": "user_query_response",
            "data": { "queryId": "Q9", "response": {
                "message": "Any update?", "isAdmin": false, "createdAt": "2026-10-03T09:00:00Z"
            } }
        }"#;
        match InboundEvent::from_text(text).unwrap() {
            Some(InboundEvent::UserQueryResponse { query_id, response }) => {
                assert_eq!(query_id, "Q9");
                assert!(!response.is_admin);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
