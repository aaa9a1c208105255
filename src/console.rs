// console.rs
//! Wires one admin session together: REST client, panel, socket and the
//! handler bindings between them.

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    config::Config,
    error::ConsoleError,
    handler::SupportEventHandler,
    panel::SupportPanel,
    realtime::{ConnectionManager, ConnectionStatus, Emitter, EventKind, EventRegistry, Subscription},
    service::{api::SupportApi, session::SessionStore},
};

pub struct SupportConsole {
    panel: Arc<SupportPanel>,
    connection: ConnectionManager,
    subscription: Subscription,
}

impl SupportConsole {
    /// Loads the panel and opens the realtime connection. A rejected token
    /// stops here; any other load failure is left on the panel as a notice
    /// and the socket is opened anyway.
    pub async fn start(
        config: &Config,
        api: Arc<dyn SupportApi>,
        session: SessionStore,
    ) -> Result<SupportConsole, ConsoleError> {
        let token = session.token()?;
        let panel = Arc::new(SupportPanel::new(api, Some(session), config.notice_ttl));

        match panel.load().await {
            Ok(()) => {}
            Err(ConsoleError::Unauthorized) => return Err(ConsoleError::Unauthorized),
            Err(e) => tracing::warn!("Initial load failed, waiting for the socket: {}", e),
        }

        let (connection, events) = ConnectionManager::open(config.connection.clone(), token);
        let handler = Arc::new(SupportEventHandler::new(
            panel.clone(),
            connection.emitter(),
            config.admin_room.clone(),
        ));

        let mut registry = EventRegistry::new();
        registry.bind_all(&EventKind::ALL, handler)?;
        let subscription = registry.attach(events);

        Ok(SupportConsole { panel, connection, subscription })
    }

    pub fn panel(&self) -> Arc<SupportPanel> {
        self.panel.clone()
    }

    pub fn emitter(&self) -> Emitter {
        self.connection.emitter()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.subscribe_status()
    }

    /// Closes the socket and waits for the last events to be dispatched.
    pub async fn shutdown(self) {
        self.connection.close().await;
        self.subscription.finished().await;
        tracing::info!("Support console stopped");
    }
}
