//! Append-only audit ledger
//!
//! Entries are chained by SHA-256: each entry stores the previous entry's
//! hash, so any in-place edit is detected by [`AuditLedger::verify_integrity`].
//! Timestamps are strictly increasing per plan.

use crate::cursor::{AuditCursor, AuditQuery};
use crate::entry::{AuditLogEntry, NewAuditEntry, GENESIS_HASH};
use crate::error::LedgerError;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct LedgerState {
    entries: Vec<Arc<AuditLogEntry>>,
    last_by_plan: HashMap<String, DateTime<Utc>>,
    // clock reading behind the latest assigned time; supplied times never move it
    last_assigned: Option<DateTime<Utc>>,
}

/// In-process audit ledger
#[derive(Debug, Default)]
pub struct AuditLedger {
    inner: Mutex<LedgerState>,
}

impl AuditLedger {
    /// Create empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    ///
    /// When `created_at` is omitted the ledger assigns the current time,
    /// bumped by a microsecond when needed so it stays strictly after the
    /// plan's latest entry and the previous clock reading. Supplied
    /// timestamps only move the floor of their own plan.
    ///
    /// # Errors
    /// - `LedgerError::InvalidEntry` if `plan_id` or `performed_by` is blank,
    ///   a supplied `created_at` is not after the plan's latest entry or
    ///   leaves no room for a later one, or no later time can be assigned
    pub fn append(&self, entry: NewAuditEntry) -> Result<Arc<AuditLogEntry>, LedgerError> {
        if entry.plan_id.trim().is_empty() {
            return Err(LedgerError::empty_field("plan_id"));
        }
        if entry.performed_by.trim().is_empty() {
            return Err(LedgerError::empty_field("performed_by"));
        }

        let mut state = self.inner.lock();
        let previous = state.last_by_plan.get(&entry.plan_id).copied();

        let created_at = match entry.created_at {
            Some(ts) => {
                if previous.is_some_and(|prev| ts <= prev) {
                    return Err(LedgerError::InvalidEntry(format!(
                        "created_at {ts} is not after the latest entry for plan {}",
                        entry.plan_id
                    )));
                }
                if advance(ts).is_none() {
                    return Err(LedgerError::InvalidEntry(format!(
                        "created_at {ts} leaves no room for later entries"
                    )));
                }
                ts
            }
            None => {
                let now = truncate_to_micros(Utc::now());
                let clock = match state.last_assigned {
                    Some(last) => now.max(advance(last).ok_or_else(|| exhausted(last, &entry.plan_id))?),
                    None => now,
                };
                let assigned = match previous {
                    Some(prev) => clock.max(advance(prev).ok_or_else(|| exhausted(prev, &entry.plan_id))?),
                    None => clock,
                };
                state.last_assigned = Some(clock);
                assigned
            }
        };

        let sequence = state.entries.len() as u64 + 1;
        let prev_hash = state
            .entries
            .last()
            .map_or_else(|| GENESIS_HASH.to_string(), |e| e.hash.clone());

        let sealed = Arc::new(AuditLogEntry::seal(sequence, entry, created_at, prev_hash));
        state.last_by_plan.insert(sealed.plan_id.clone(), created_at);
        state.entries.push(Arc::clone(&sealed));

        tracing::debug!(
            sequence,
            plan_id = %sealed.plan_id,
            action = %sealed.action,
            "audit entry appended"
        );
        Ok(sealed)
    }

    /// Open a lazy listing over the entries present now
    ///
    /// The cursor never sees entries appended after it was opened.
    #[must_use]
    pub fn list(&self, query: AuditQuery) -> AuditCursor {
        let mut snapshot: Vec<Arc<AuditLogEntry>> = self.inner.lock().entries.clone();
        snapshot.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.sequence.cmp(&b.sequence)));
        AuditCursor::new(snapshot.into(), query)
    }

    /// Entries for one plan, oldest first
    #[must_use]
    pub fn history(&self, plan_id: &str) -> Vec<Arc<AuditLogEntry>> {
        self.list(AuditQuery::new().for_plan(plan_id).with_order(crate::SortOrder::Asc))
            .collect()
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Walk the chain and recompute every hash
    ///
    /// # Errors
    /// - `LedgerError::IntegrityViolation` at the first broken link
    pub fn verify_integrity(&self) -> Result<(), LedgerError> {
        let state = self.inner.lock();
        verify_chain(&state.entries)
    }
}

fn verify_chain(entries: &[Arc<AuditLogEntry>]) -> Result<(), LedgerError> {
    let mut prev = GENESIS_HASH.to_string();
    for entry in entries {
        if entry.prev_hash != prev || entry.hash != entry.compute_hash() {
            return Err(LedgerError::IntegrityViolation {
                sequence: entry.sequence,
            });
        }
        prev.clone_from(&entry.hash);
    }
    Ok(())
}

fn advance(ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
    ts.checked_add_signed(Duration::microseconds(1))
}

fn exhausted(latest: DateTime<Utc>, plan_id: &str) -> LedgerError {
    LedgerError::InvalidEntry(format!("no timestamp after {latest} is available for plan {plan_id}"))
}

fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(ts.timestamp_micros()).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AuditAction;
    use crate::SortOrder;
    use pretty_assertions::assert_eq;

    fn entry(action: AuditAction, plan: &str) -> NewAuditEntry {
        NewAuditEntry::new(action, plan, "ops@example.com")
    }

    #[test]
    fn append_assigns_sequence_and_chain() {
        let ledger = AuditLedger::new();
        let first = ledger.append(entry(AuditAction::PlanGenerated, "p1")).unwrap();
        let second = ledger.append(entry(AuditAction::PlanApproved, "p1")).unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(first.prev_hash, GENESIS_HASH);
        assert_eq!(second.prev_hash, first.hash);
        assert!(second.created_at > first.created_at);
        assert!(ledger.verify_integrity().is_ok());
    }

    #[test]
    fn submitted_fields_are_kept() {
        let ledger = AuditLedger::new();
        let ts = Utc::now() - Duration::hours(1);
        let stored = ledger
            .append(entry(AuditAction::PlanExecuted, "p1").with_created_at(ts).with_detail("simulated", true))
            .unwrap();
        assert_eq!(stored.created_at, ts);
        assert_eq!(stored.performed_by, "ops@example.com");
        assert_eq!(stored.details["simulated"], true);
    }

    #[test]
    fn blank_fields_rejected() {
        let ledger = AuditLedger::new();
        assert!(matches!(
            ledger.append(NewAuditEntry::new(AuditAction::PlanApproved, "p1", " ")),
            Err(LedgerError::InvalidEntry(_))
        ));
        assert!(matches!(
            ledger.append(NewAuditEntry::new(AuditAction::PlanApproved, "", "ops")),
            Err(LedgerError::InvalidEntry(_))
        ));
        assert!(ledger.is_empty());
    }

    #[test]
    fn supplied_timestamp_must_advance_per_plan() {
        let ledger = AuditLedger::new();
        let ts = Utc::now();
        ledger.append(entry(AuditAction::PlanGenerated, "p1").with_created_at(ts)).unwrap();

        let err = ledger
            .append(entry(AuditAction::PlanApproved, "p1").with_created_at(ts))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidEntry(_)));

        // other plans are unaffected
        ledger.append(entry(AuditAction::PlanGenerated, "p2").with_created_at(ts)).unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn assigned_timestamp_follows_future_supplied_one() {
        let ledger = AuditLedger::new();
        let future = Utc::now() + Duration::hours(1);
        ledger.append(entry(AuditAction::PlanGenerated, "p1").with_created_at(future)).unwrap();
        let next = ledger.append(entry(AuditAction::PlanApproved, "p1")).unwrap();
        assert!(next.created_at > future);
    }

    #[test]
    fn future_timestamp_does_not_leak_to_other_plans() {
        let ledger = AuditLedger::new();
        let future = Utc::now() + Duration::days(365 * 100);
        ledger.append(entry(AuditAction::PlanGenerated, "p1").with_created_at(future)).unwrap();

        let other = ledger.append(entry(AuditAction::PlanGenerated, "p2")).unwrap();
        assert!(other.created_at < future);
        assert!(other.created_at <= Utc::now());

        let again = ledger.append(entry(AuditAction::PlanApproved, "p2")).unwrap();
        assert!(again.created_at > other.created_at);
    }

    #[test]
    fn timestamp_without_successor_is_rejected() {
        let ledger = AuditLedger::new();
        let err = ledger
            .append(entry(AuditAction::PlanGenerated, "p1").with_created_at(DateTime::<Utc>::MAX_UTC))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidEntry(_)));
        assert!(ledger.is_empty());

        let latest = DateTime::<Utc>::MAX_UTC - Duration::microseconds(1);
        ledger.append(entry(AuditAction::PlanGenerated, "p1").with_created_at(latest)).unwrap();
        let last = ledger.append(entry(AuditAction::PlanApproved, "p1")).unwrap();
        assert_eq!(last.created_at, DateTime::<Utc>::MAX_UTC);
        assert!(matches!(
            ledger.append(entry(AuditAction::PlanExecuted, "p1")),
            Err(LedgerError::InvalidEntry(_))
        ));

        let other = ledger.append(entry(AuditAction::PlanGenerated, "p2")).unwrap();
        assert!(other.created_at <= Utc::now());
        assert_eq!(ledger.len(), 3);
        assert!(ledger.verify_integrity().is_ok());
    }

    #[test]
    fn list_defaults_to_newest_first() {
        let ledger = AuditLedger::new();
        ledger.append(entry(AuditAction::PlanGenerated, "p1")).unwrap();
        ledger.append(entry(AuditAction::PlanGenerated, "p2")).unwrap();
        ledger.append(entry(AuditAction::PlanApproved, "p1")).unwrap();

        let all: Vec<_> = ledger.list(AuditQuery::new()).map(|e| e.sequence).collect();
        assert_eq!(all, vec![3, 2, 1]);

        let p1: Vec<_> = ledger
            .list(AuditQuery::new().for_plan("p1").with_order(SortOrder::Asc))
            .map(|e| e.action)
            .collect();
        assert_eq!(p1, vec![AuditAction::PlanGenerated, AuditAction::PlanApproved]);
    }

    #[test]
    fn cursor_is_restartable_and_limited() {
        let ledger = AuditLedger::new();
        for plan in ["a", "b", "c"] {
            ledger.append(entry(AuditAction::PlanGenerated, plan)).unwrap();
        }
        let mut cursor = ledger.list(AuditQuery::new().with_limit(2));
        let first: Vec<_> = cursor.by_ref().map(|e| e.plan_id.clone()).collect();
        assert_eq!(first, vec!["c", "b"]);
        assert!(cursor.next().is_none());

        cursor.restart();
        let again: Vec<_> = cursor.map(|e| e.plan_id.clone()).collect();
        assert_eq!(again, first);
    }

    #[test]
    fn cursor_is_a_snapshot() {
        let ledger = AuditLedger::new();
        ledger.append(entry(AuditAction::PlanGenerated, "a")).unwrap();
        let cursor = ledger.list(AuditQuery::new());
        ledger.append(entry(AuditAction::PlanGenerated, "b")).unwrap();
        assert_eq!(cursor.count(), 1);
    }

    #[test]
    fn tampering_is_detected() {
        let ledger = AuditLedger::new();
        ledger.append(entry(AuditAction::PlanGenerated, "p1")).unwrap();
        ledger.append(entry(AuditAction::PlanApproved, "p1")).unwrap();

        let mut entries = ledger.inner.lock().entries.clone();
        let mut forged = (*entries[0]).clone();
        forged.performed_by = "mallory".to_string();
        entries[0] = Arc::new(forged);

        assert_eq!(verify_chain(&entries), Err(LedgerError::IntegrityViolation { sequence: 1 }));
    }
}
