// realtime/registry.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};

use super::events::{EventKind, InboundEvent};
use crate::error::ConsoleError;

/// Receives the events it was bound to. Implementations must tolerate the
/// same logical event arriving twice.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &InboundEvent);
}

/// Fixed set of event-name → handler bindings for one connection instance.
#[derive(Default)]
pub struct EventRegistry {
    handlers: BTreeMap<EventKind, Arc<dyn EventHandler>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Result<(), ConsoleError> {
        if self.handlers.contains_key(&kind) {
            return Err(ConsoleError::HandlerAlreadyBound(kind));
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    pub fn bind_all(
        &mut self,
        kinds: &[EventKind],
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), ConsoleError> {
        for kind in kinds {
            self.bind(*kind, handler.clone())?;
        }
        Ok(())
    }

    pub fn is_bound(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub async fn dispatch(&self, event: &InboundEvent) {
        match self.handlers.get(&event.kind()) {
            Some(handler) => handler.handle(event).await,
            None => tracing::trace!("No handler bound for '{}'", event.kind().as_str()),
        }
    }

    /// Consumes the registry and feeds it every event from `events` until
    /// the connection's event stream ends or the subscription is dropped.
    pub fn attach(self, mut events: mpsc::UnboundedReceiver<InboundEvent>) -> Subscription {
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.dispatch(&event).await;
            }
            tracing::debug!("Support event stream ended");
        });
        Subscription { task }
    }
}

/// Keeps the bindings alive; dropping it unbinds every handler.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Waits until every queued event has been dispatched. Only returns once
    /// the connection's event sender is gone.
    pub async fn finished(mut self) {
        if let Err(e) = (&mut self.task).await {
            if !e.is_cancelled() {
                tracing::warn!("Support event dispatcher failed: {}", e);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
