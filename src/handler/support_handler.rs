// handler/support_handler.rs
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    panel::SupportPanel,
    realtime::{Emitter, EventHandler, InboundEvent},
};

/// Binds the realtime stream to the support panel.
pub struct SupportEventHandler {
    panel: Arc<SupportPanel>,
    emitter: Emitter,
    admin_room: String,
    connects: AtomicU32,
}

impl SupportEventHandler {
    pub fn new(panel: Arc<SupportPanel>, emitter: Emitter, admin_room: impl Into<String>) -> Self {
        Self {
            panel,
            emitter,
            admin_room: admin_room.into(),
            connects: AtomicU32::new(0),
        }
    }

    async fn on_connect(&self) {
        let previous = self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.emitter.join_room(&self.admin_room) {
            tracing::warn!("Connected but could not join '{}'", self.admin_room);
        }

        // events sent while we were offline are not replayed
        if previous > 0 || self.panel.needs_full_fetch() {
            tracing::info!("Connected, refreshing support data");
            if let Err(e) = self.panel.load().await {
                tracing::error!("Refresh after connect failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl EventHandler for SupportEventHandler {
    async fn handle(&self, event: &InboundEvent) {
        match event {
            InboundEvent::Connect => self.on_connect().await,
            InboundEvent::Disconnect { reason } => {
                tracing::warn!("Support socket disconnected: {}", reason);
                self.panel.apply_event(event).await;
            }
            InboundEvent::ConnectError { error } => {
                tracing::warn!("Support socket connect error: {}", error);
            }
            InboundEvent::Error { error } => {
                tracing::error!("Support socket error: {}", error);
            }
            InboundEvent::RoomJoined { room_id } => {
                tracing::info!("Joined room {}", room_id);
            }
            InboundEvent::NewQueryCreated(query) => {
                tracing::info!("New support query {}", query.id);
                self.panel.apply_event(event).await;
            }
            InboundEvent::NewTicketCreated(ticket) => {
                tracing::info!("New support ticket {}", ticket.id);
                self.panel.apply_event(event).await;
            }
            InboundEvent::UserQueryResponse { .. }
            | InboundEvent::UserTicketMessage { .. }
            | InboundEvent::TypingStart(_)
            | InboundEvent::TypingStop(_) => {
                self.panel.apply_event(event).await;
            }
            other => tracing::debug!("Support event '{}'", other.kind().as_str()),
        }
    }
}
