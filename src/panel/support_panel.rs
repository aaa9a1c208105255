// panel/support_panel.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex};
use validator::Validate;

use super::filters::{filter_records, SupportFilters, SupportStats};
use crate::{
    dtos::supportdtos::{optional_note, ThreadEntryDto, UpdateQueryStatusDto, UpdateTicketStatusDto},
    error::ConsoleError,
    models::supportmodel::{SupportQuery, SupportStatus, SupportTicket},
    realtime::events::InboundEvent,
    service::{api::SupportApi, session::SessionStore},
    store::{NoticeLevel, SupportSnapshot, SupportStore},
};

/// Customer-support view: owns the local copy of queries and tickets and
/// every operator action on them.
pub struct SupportPanel {
    api: Arc<dyn SupportApi>,
    store: Arc<Mutex<SupportStore>>,
    snapshots: Arc<watch::Sender<SupportSnapshot>>,
    session: Option<SessionStore>,
    notice_ttl: Duration,
    /// Set until a full fetch has succeeded, and again whenever one fails.
    stale: AtomicBool,
}

impl SupportPanel {
    pub fn new(api: Arc<dyn SupportApi>, session: Option<SessionStore>, notice_ttl: Duration) -> Self {
        let (snapshots, _) = watch::channel(SupportSnapshot::default());
        Self {
            api,
            store: Arc::new(Mutex::new(SupportStore::new())),
            snapshots: Arc::new(snapshots),
            session,
            notice_ttl,
            stale: AtomicBool::new(true),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SupportSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> SupportSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Whether the local collections still lack a successful full fetch.
    pub fn needs_full_fetch(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// Full fetch of both collections, replacing whatever is held locally.
    pub async fn load(&self) -> Result<(), ConsoleError> {
        let fetched = tokio::try_join!(self.api.fetch_queries(), self.api.fetch_tickets());
        self.stale.store(fetched.is_err(), Ordering::SeqCst);
        match fetched {
            Ok((queries, tickets)) => {
                tracing::info!("Loaded {} queries and {} tickets", queries.len(), tickets.len());
                self.update(|store| {
                    store.replace_queries(queries);
                    store.replace_tickets(tickets);
                    store.set_auth_required(false);
                    true
                })
                .await;
                Ok(())
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    pub async fn apply_event(&self, event: &InboundEvent) -> bool {
        self.update(|store| store.apply(event)).await
    }

    // Detail views

    pub async fn open_query(&self, query_id: &str) -> bool {
        self.update(|store| store.open_query(query_id)).await
    }

    pub async fn open_ticket(&self, ticket_id: &str) -> bool {
        self.update(|store| store.open_ticket(ticket_id)).await
    }

    pub async fn close_detail(&self) -> bool {
        self.update(|store| store.close_detail()).await
    }

    // Operator actions. Each one validates first, calls the backend, and only
    // touches local state once the call succeeded.

    pub async fn submit_query_response(&self, query_id: &str, message: &str) -> Result<(), ConsoleError> {
        let body = ThreadEntryDto::new(message);
        body.validate()?;

        match self.api.add_query_response(query_id, &body).await {
            Ok(updated) => {
                self.update(|store| store.replace_query(updated)).await;
                self.succeed("Response sent").await;
                Ok(())
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    pub async fn change_query_status(
        &self,
        query_id: &str,
        status: SupportStatus,
        note: Option<&str>,
    ) -> Result<(), ConsoleError> {
        let body = UpdateQueryStatusDto { status, response: optional_note(note) };
        body.validate()?;

        match self.api.update_query_status(query_id, &body).await {
            Ok(confirmed) => {
                self.update(|store| {
                    let mut changed = store.set_query_status(query_id, status);
                    if confirmed.status != status {
                        tracing::warn!(
                            "Server kept query {} at '{}' instead of '{}'",
                            query_id,
                            confirmed.status.to_str(),
                            status.to_str()
                        );
                    }
                    changed |= store.replace_query(confirmed);
                    changed
                })
                .await;
                self.succeed(format!("Query marked {}", status.to_str())).await;
                Ok(())
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    pub async fn submit_ticket_message(&self, ticket_id: &str, message: &str) -> Result<(), ConsoleError> {
        let body = ThreadEntryDto::new(message);
        body.validate()?;

        match self.api.add_ticket_message(ticket_id, &body).await {
            Ok(updated) => {
                self.update(|store| store.replace_ticket(updated)).await;
                self.succeed("Message sent").await;
                Ok(())
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    pub async fn change_ticket_status(
        &self,
        ticket_id: &str,
        status: SupportStatus,
        note: Option<&str>,
    ) -> Result<(), ConsoleError> {
        let body = UpdateTicketStatusDto { status, message: optional_note(note) };
        body.validate()?;

        match self.api.update_ticket_status(ticket_id, &body).await {
            Ok(confirmed) => {
                self.update(|store| {
                    let mut changed = store.set_ticket_status(ticket_id, status);
                    if confirmed.status != status {
                        tracing::warn!(
                            "Server kept ticket {} at '{}' instead of '{}'",
                            ticket_id,
                            confirmed.status.to_str(),
                            status.to_str()
                        );
                    }
                    changed |= store.replace_ticket(confirmed);
                    changed
                })
                .await;
                self.succeed(format!("Ticket marked {}", status.to_str())).await;
                Ok(())
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    // Derived state, recomputed from the current snapshot on every call

    pub fn filtered_queries(&self, filters: &SupportFilters) -> Vec<SupportQuery> {
        filter_records(&self.snapshot().queries, filters)
    }

    pub fn filtered_tickets(&self, filters: &SupportFilters) -> Vec<SupportTicket> {
        filter_records(&self.snapshot().tickets, filters)
    }

    pub fn query_stats(&self) -> SupportStats {
        SupportStats::compute(&self.snapshot().queries)
    }

    pub fn ticket_stats(&self) -> SupportStats {
        SupportStats::compute(&self.snapshot().tickets)
    }

    async fn update<F>(&self, change: F) -> bool
    where
        F: FnOnce(&mut SupportStore) -> bool,
    {
        let mut store = self.store.lock().await;
        let changed = change(&mut store);
        if changed {
            self.snapshots.send_replace(store.snapshot());
        }
        changed
    }

    async fn succeed(&self, text: impl Into<String>) {
        let ttl = self.notice_ttl;
        self.update(|store| {
            store.set_notice(NoticeLevel::Success, text, ttl);
            true
        })
        .await;
        self.expire_notice_later();
    }

    /// Publishes a snapshot without the notice once its TTL has passed. A
    /// newer notice set in the meantime is left alone.
    fn expire_notice_later(&self) {
        let store = self.store.clone();
        let snapshots = self.snapshots.clone();
        let ttl = self.notice_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut store = store.lock().await;
            if store.clear_expired_notice(Instant::now()) {
                snapshots.send_replace(store.snapshot());
            }
        });
    }

    /// Turns a failed call into panel state and hands the error back.
    async fn fail(&self, err: ConsoleError) -> ConsoleError {
        let ttl = self.notice_ttl;
        if let ConsoleError::Unauthorized = err {
            if let Some(session) = &self.session {
                if let Err(e) = session.clear() {
                    tracing::warn!("Could not clear stored session: {}", e);
                }
            }
        } else {
            tracing::error!("Support request failed: {}", err);
        }

        let message = err.to_string();
        let unauthorized = matches!(err, ConsoleError::Unauthorized);
        self.update(|store| {
            if unauthorized {
                store.set_auth_required(true);
            }
            store.set_notice(NoticeLevel::Error, message, ttl);
            true
        })
        .await;
        self.expire_notice_later();
        err
    }
}
