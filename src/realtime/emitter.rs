// realtime/emitter.rs
use tokio::sync::{mpsc, watch};

use super::{commands::OutboundCommand, connection::ConnectionStatus};
use crate::models::{chatmodels::MessageType, supportmodel::SupportStatus};

/// Fire-and-forget command handle. Clones share the same connection, so a
/// view can hold one for as long as it likes.
///
/// Every method is a silent no-op while the connection is down; the return
/// value only tells whether the command was handed to the transport.
#[derive(Debug, Clone)]
pub struct Emitter {
    outbound: mpsc::UnboundedSender<OutboundCommand>,
    status: watch::Receiver<ConnectionStatus>,
}

impl Emitter {
    pub(crate) fn new(
        outbound: mpsc::UnboundedSender<OutboundCommand>,
        status: watch::Receiver<ConnectionStatus>,
    ) -> Self {
        Self { outbound, status }
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().connected
    }

    pub fn join_room(&self, room_id: &str) -> bool {
        self.emit(OutboundCommand::JoinRoom { room_id: room_id.to_string() })
    }

    pub fn send_message(&self, room_id: &str, message: &str, message_type: Option<MessageType>) -> bool {
        self.emit(OutboundCommand::SendMessage {
            room_id: room_id.to_string(),
            message: message.to_string(),
            message_type: message_type.unwrap_or_default(),
        })
    }

    pub fn start_typing(&self, room_id: &str) -> bool {
        self.emit(OutboundCommand::TypingStart { room_id: room_id.to_string() })
    }

    pub fn stop_typing(&self, room_id: &str) -> bool {
        self.emit(OutboundCommand::TypingStop { room_id: room_id.to_string() })
    }

    pub fn mark_read(&self, room_id: &str) -> bool {
        self.emit(OutboundCommand::MarkRead { room_id: room_id.to_string() })
    }

    pub fn update_query_status(&self, query_id: &str, status: SupportStatus, response: Option<String>) -> bool {
        self.emit(OutboundCommand::UpdateQueryStatus {
            query_id: query_id.to_string(),
            status,
            response,
        })
    }

    pub fn update_ticket_status(&self, ticket_id: &str, status: SupportStatus, message: Option<String>) -> bool {
        self.emit(OutboundCommand::UpdateTicketStatus {
            ticket_id: ticket_id.to_string(),
            status,
            message,
        })
    }

    pub fn ping(&self) -> bool {
        self.emit(OutboundCommand::Ping)
    }

    fn emit(&self, command: OutboundCommand) -> bool {
        if !self.is_connected() {
            tracing::debug!("Dropping '{}' while disconnected", command.name());
            return false;
        }

        match self.outbound.send(command) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Dropping '{}': connection task has stopped", e.0.name());
                false
            }
        }
    }
}
