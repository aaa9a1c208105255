// store/supportstore.rs
//! In-memory copy of the support queries and tickets.
//!
//! The backend owns these records; this store only caches them. Collections
//! are never mutated in place: every change builds a new `Vec` behind a new
//! `Arc`, so a snapshot handed to a view never changes underneath it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    models::supportmodel::{QueryResponse, SupportQuery, SupportRecord, SupportStatus, SupportTicket, TicketMessage},
    realtime::events::InboundEvent,
};

#[derive(Debug, Clone, PartialEq)]
pub enum DetailView {
    Query(SupportQuery),
    Ticket(SupportTicket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub expires_at: Instant,
}

impl Notice {
    pub fn is_active(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, Default)]
pub struct SupportSnapshot {
    pub queries: Arc<Vec<SupportQuery>>,
    pub tickets: Arc<Vec<SupportTicket>>,
    pub detail: Option<DetailView>,
    /// room id → users currently typing in it
    pub typing: BTreeMap<String, BTreeSet<String>>,
    pub notice: Option<Notice>,
    pub auth_required: bool,
}

impl SupportSnapshot {
    pub fn active_notice(&self, now: Instant) -> Option<&Notice> {
        self.notice.as_ref().filter(|n| n.is_active(now))
    }
}

#[derive(Debug, Default)]
pub struct SupportStore {
    queries: Arc<Vec<SupportQuery>>,
    tickets: Arc<Vec<SupportTicket>>,
    detail: Option<DetailView>,
    typing: BTreeMap<String, BTreeSet<String>>,
    notice: Option<Notice>,
    auth_required: bool,
}

impl SupportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SupportSnapshot {
        SupportSnapshot {
            queries: self.queries.clone(),
            tickets: self.tickets.clone(),
            detail: self.detail.clone(),
            typing: self.typing.clone(),
            notice: self.notice.clone(),
            auth_required: self.auth_required,
        }
    }

    pub fn queries(&self) -> &[SupportQuery] {
        &self.queries
    }

    pub fn tickets(&self) -> &[SupportTicket] {
        &self.tickets
    }

    pub fn detail(&self) -> Option<&DetailView> {
        self.detail.as_ref()
    }

    /// Folds one inbound event into the store. Returns whether anything
    /// visible changed.
    pub fn apply(&mut self, event: &InboundEvent) -> bool {
        match event {
            InboundEvent::NewQueryCreated(query) => self.insert_query(query.clone()),
            InboundEvent::NewTicketCreated(ticket) => self.insert_ticket(ticket.clone()),
            InboundEvent::UserQueryResponse { query_id, response } => {
                self.append_query_response(query_id, response.clone())
            }
            InboundEvent::UserTicketMessage { ticket_id, message } => {
                self.append_ticket_message(ticket_id, message.clone())
            }
            InboundEvent::TypingStart(typing) => self.typing_started(&typing.room, &typing.user_id),
            InboundEvent::TypingStop(typing) => self.typing_stopped(&typing.room, &typing.user_id),
            InboundEvent::Disconnect { .. } => self.clear_typing(),
            _ => false,
        }
    }

    // Full fetch

    pub fn replace_queries(&mut self, queries: Vec<SupportQuery>) {
        if let Some(DetailView::Query(open)) = &self.detail {
            if let Some(fresh) = queries.iter().find(|q| q.id == open.id) {
                self.detail = Some(DetailView::Query(fresh.clone()));
            }
        }
        self.queries = Arc::new(queries);
    }

    pub fn replace_tickets(&mut self, tickets: Vec<SupportTicket>) {
        if let Some(DetailView::Ticket(open)) = &self.detail {
            if let Some(fresh) = tickets.iter().find(|t| t.id == open.id) {
                self.detail = Some(DetailView::Ticket(fresh.clone()));
            }
        }
        self.tickets = Arc::new(tickets);
    }

    // Created events

    pub fn insert_query(&mut self, query: SupportQuery) -> bool {
        match prepend_new(&self.queries, query) {
            Some(next) => {
                self.queries = next;
                true
            }
            None => false,
        }
    }

    pub fn insert_ticket(&mut self, ticket: SupportTicket) -> bool {
        match prepend_new(&self.tickets, ticket) {
            Some(next) => {
                self.tickets = next;
                true
            }
            None => false,
        }
    }

    // Thread appends

    pub fn append_query_response(&mut self, query_id: &str, response: QueryResponse) -> bool {
        let mut changed = false;
        if let Some(next) = append_entry(&self.queries, query_id, response.clone()) {
            self.queries = next;
            changed = true;
        }
        if let Some(DetailView::Query(open)) = self.detail.as_mut() {
            if open.id == query_id {
                open.push_entry(response);
                changed = true;
            }
        }
        changed
    }

    pub fn append_ticket_message(&mut self, ticket_id: &str, message: TicketMessage) -> bool {
        let mut changed = false;
        if let Some(next) = append_entry(&self.tickets, ticket_id, message.clone()) {
            self.tickets = next;
            changed = true;
        }
        if let Some(DetailView::Ticket(open)) = self.detail.as_mut() {
            if open.id == ticket_id {
                open.push_entry(message);
                changed = true;
            }
        }
        changed
    }

    // Status changes

    pub fn set_query_status(&mut self, query_id: &str, status: SupportStatus) -> bool {
        let mut changed = false;
        if let Some(next) = with_status(&self.queries, query_id, status) {
            self.queries = next;
            changed = true;
        }
        if let Some(DetailView::Query(open)) = self.detail.as_mut() {
            if open.id == query_id && open.status != status {
                open.set_status(status);
                changed = true;
            }
        }
        changed
    }

    pub fn set_ticket_status(&mut self, ticket_id: &str, status: SupportStatus) -> bool {
        let mut changed = false;
        if let Some(next) = with_status(&self.tickets, ticket_id, status) {
            self.tickets = next;
            changed = true;
        }
        if let Some(DetailView::Ticket(open)) = self.detail.as_mut() {
            if open.id == ticket_id && open.status != status {
                open.set_status(status);
                changed = true;
            }
        }
        changed
    }

    /// Replaces a known query with the copy the server returned.
    pub fn replace_query(&mut self, query: SupportQuery) -> bool {
        let mut changed = false;
        if let Some(DetailView::Query(open)) = self.detail.as_mut() {
            if open.id == query.id && *open != query {
                *open = query.clone();
                changed = true;
            }
        }
        if let Some(next) = replace_record(&self.queries, query) {
            self.queries = next;
            changed = true;
        }
        changed
    }

    pub fn replace_ticket(&mut self, ticket: SupportTicket) -> bool {
        let mut changed = false;
        if let Some(DetailView::Ticket(open)) = self.detail.as_mut() {
            if open.id == ticket.id && *open != ticket {
                *open = ticket.clone();
                changed = true;
            }
        }
        if let Some(next) = replace_record(&self.tickets, ticket) {
            self.tickets = next;
            changed = true;
        }
        changed
    }

    // Detail views

    pub fn open_query(&mut self, query_id: &str) -> bool {
        match self.queries.iter().find(|q| q.id == query_id) {
            Some(query) => {
                self.detail = Some(DetailView::Query(query.clone()));
                true
            }
            None => false,
        }
    }

    pub fn open_ticket(&mut self, ticket_id: &str) -> bool {
        match self.tickets.iter().find(|t| t.id == ticket_id) {
            Some(ticket) => {
                self.detail = Some(DetailView::Ticket(ticket.clone()));
                true
            }
            None => false,
        }
    }

    pub fn close_detail(&mut self) -> bool {
        self.detail.take().is_some()
    }

    // Typing indicators

    pub fn typing_started(&mut self, room: &str, user_id: &str) -> bool {
        self.typing
            .entry(room.to_string())
            .or_default()
            .insert(user_id.to_string())
    }

    pub fn typing_stopped(&mut self, room: &str, user_id: &str) -> bool {
        let Some(users) = self.typing.get_mut(room) else {
            return false;
        };
        let removed = users.remove(user_id);
        if users.is_empty() {
            self.typing.remove(room);
        }
        removed
    }

    pub fn clear_typing(&mut self) -> bool {
        let had_any = !self.typing.is_empty();
        self.typing.clear();
        had_any
    }

    // Operator feedback

    pub fn set_notice(&mut self, level: NoticeLevel, text: impl Into<String>, ttl: Duration) {
        self.notice = Some(Notice {
            level,
            text: text.into(),
            expires_at: Instant::now() + ttl,
        });
    }

    /// Drops the notice if it has expired by `now`.
    pub fn clear_expired_notice(&mut self, now: Instant) -> bool {
        match &self.notice {
            Some(notice) if !notice.is_active(now) => {
                self.notice = None;
                true
            }
            _ => false,
        }
    }

    pub fn set_auth_required(&mut self, required: bool) {
        self.auth_required = required;
    }
}

fn prepend_new<R: SupportRecord>(list: &Arc<Vec<R>>, record: R) -> Option<Arc<Vec<R>>> {
    if list.iter().any(|r| r.id() == record.id()) {
        tracing::debug!("Ignoring duplicate create for {}", record.id());
        return None;
    }
    let mut next = Vec::with_capacity(list.len() + 1);
    next.push(record);
    next.extend(list.iter().cloned());
    Some(Arc::new(next))
}

fn append_entry<R: SupportRecord>(list: &Arc<Vec<R>>, id: &str, entry: R::Entry) -> Option<Arc<Vec<R>>> {
    let index = list.iter().position(|r| r.id() == id)?;
    let mut next: Vec<R> = list.as_ref().clone();
    next[index].push_entry(entry);
    Some(Arc::new(next))
}

fn with_status<R: SupportRecord>(list: &Arc<Vec<R>>, id: &str, status: SupportStatus) -> Option<Arc<Vec<R>>> {
    let index = list.iter().position(|r| r.id() == id)?;
    if list[index].status() == status {
        return None;
    }
    let mut next: Vec<R> = list.as_ref().clone();
    next[index].set_status(status);
    Some(Arc::new(next))
}

fn replace_record<R: SupportRecord>(list: &Arc<Vec<R>>, record: R) -> Option<Arc<Vec<R>>> {
    let index = list.iter().position(|r| r.id() == record.id())?;
    let mut next: Vec<R> = list.as_ref().clone();
    next[index] = record;
    Some(Arc::new(next))
}
