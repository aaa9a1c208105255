// panel/filters.rs
use std::collections::{BTreeMap, BTreeSet};

use crate::models::supportmodel::{SupportPriority, SupportRecord, SupportStatus};

/// Operator-controlled filters of the support panel. `None` / empty means
/// "all".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupportFilters {
    pub search: String,
    pub status: Option<SupportStatus>,
    pub category: Option<String>,
    pub priority: Option<SupportPriority>,
}

impl SupportFilters {
    pub fn matches<R: SupportRecord>(&self, record: &R) -> bool {
        if let Some(status) = self.status {
            if record.status() != status {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if record.priority() != priority {
                return false;
            }
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            if !record.category().eq_ignore_ascii_case(category) {
                return false;
            }
        }

        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        let [heading, body] = record.search_fields();
        let customer = record.customer();
        [heading, body, customer.name.as_str(), customer.email.as_str()]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Filtered projection, keeping the collection's order.
pub fn filter_records<R: SupportRecord>(records: &[R], filters: &SupportFilters) -> Vec<R> {
    records
        .iter()
        .filter(|record| filters.matches(*record))
        .cloned()
        .collect()
}

/// Distinct categories present, for the category dropdown.
pub fn categories<R: SupportRecord>(records: &[R]) -> BTreeSet<String> {
    records
        .iter()
        .map(|r| r.category().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportStats {
    pub total: usize,
    pub by_status: BTreeMap<SupportStatus, usize>,
    pub urgent: usize,
    pub high_priority: usize,
    /// Records not yet resolved or closed.
    pub active: usize,
}

impl SupportStats {
    pub fn compute<R: SupportRecord>(records: &[R]) -> Self {
        let mut stats = SupportStats {
            total: records.len(),
            ..SupportStats::default()
        };
        for record in records {
            *stats.by_status.entry(record.status()).or_insert(0) += 1;
            match record.priority() {
                SupportPriority::Urgent => stats.urgent += 1,
                SupportPriority::High => stats.high_priority += 1,
                _ => {}
            }
            if !record.status().is_terminal() {
                stats.active += 1;
            }
        }
        stats
    }

    pub fn count(&self, status: SupportStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}
