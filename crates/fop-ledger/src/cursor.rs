//! Lazy listing over a ledger snapshot
//!
//! A cursor owns a shared, already-ordered snapshot and walks it on demand,
//! applying the query filters as it goes. `restart` rewinds to the first
//! match so the same listing can be consumed more than once.

use crate::entry::{AuditAction, AuditLogEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Listing order by `created_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first
    Asc,
    /// Newest first
    #[default]
    Desc,
}

/// Listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    /// Only entries for this plan
    pub plan_id: Option<String>,
    /// Only entries with this action
    pub action: Option<AuditAction>,
    /// Ordering
    pub order: SortOrder,
    /// Stop after this many matches
    pub limit: Option<usize>,
}

impl AuditQuery {
    /// Unfiltered, newest first
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one plan
    #[inline]
    #[must_use]
    pub fn for_plan(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    /// Restrict to one action
    #[inline]
    #[must_use]
    pub fn with_action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Set ordering
    #[inline]
    #[must_use]
    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Cap the number of results
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.plan_id.as_deref().map_or(true, |id| entry.plan_id == id)
            && self.action.map_or(true, |action| entry.action == action)
    }
}

/// Finite, restartable iterator over matching entries
#[derive(Debug, Clone)]
pub struct AuditCursor {
    snapshot: Arc<[Arc<AuditLogEntry>]>,
    query: AuditQuery,
    position: usize,
    yielded: usize,
}

impl AuditCursor {
    pub(crate) fn new(snapshot: Arc<[Arc<AuditLogEntry>]>, query: AuditQuery) -> Self {
        Self {
            snapshot,
            query,
            position: 0,
            yielded: 0,
        }
    }

    /// Rewind to the first match
    pub fn restart(&mut self) {
        self.position = 0;
        self.yielded = 0;
    }

    /// Query this cursor was opened with
    #[inline]
    #[must_use]
    pub fn query(&self) -> &AuditQuery {
        &self.query
    }

    fn index(&self, position: usize) -> usize {
        match self.query.order {
            SortOrder::Asc => position,
            SortOrder::Desc => self.snapshot.len() - 1 - position,
        }
    }
}

impl Iterator for AuditCursor {
    type Item = Arc<AuditLogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.query.limit.is_some_and(|limit| self.yielded >= limit) {
            return None;
        }
        while self.position < self.snapshot.len() {
            let entry = &self.snapshot[self.index(self.position)];
            self.position += 1;
            if self.query.matches(entry) {
                self.yielded += 1;
                return Some(Arc::clone(entry));
            }
        }
        None
    }
}
