//! Audit entry types
//!
//! `NewAuditEntry` is what callers submit; `AuditLogEntry` is what the ledger
//! stores, with its sequence number, timestamp and chain hashes filled in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// State-changing action recorded in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Plan created
    PlanGenerated,
    /// PLANNED -> APPROVED
    PlanApproved,
    /// APPROVED -> EXECUTED
    PlanExecuted,
    /// EXECUTED -> ROLLED_BACK
    PlanRolledBack,
}

impl AuditAction {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PlanGenerated => "PLAN_GENERATED",
            AuditAction::PlanApproved => "PLAN_APPROVED",
            AuditAction::PlanExecuted => "PLAN_EXECUTED",
            AuditAction::PlanRolledBack => "PLAN_ROLLED_BACK",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque key-value payload attached to an entry
pub type AuditDetails = BTreeMap<String, serde_json::Value>;

/// Entry as submitted by a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    /// Recorded action
    pub action: AuditAction,
    /// Plan the action applies to
    pub plan_id: String,
    /// Identity that performed the action
    pub performed_by: String,
    /// Caller-chosen timestamp; assigned by the ledger when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Free-form details
    #[serde(default)]
    pub details: AuditDetails,
}

impl NewAuditEntry {
    /// Create entry with no details and a ledger-assigned timestamp
    #[must_use]
    pub fn new(action: AuditAction, plan_id: impl Into<String>, performed_by: impl Into<String>) -> Self {
        Self {
            action,
            plan_id: plan_id.into(),
            performed_by: performed_by.into(),
            created_at: None,
            details: AuditDetails::new(),
        }
    }

    /// With a detail value
    #[inline]
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// With an explicit timestamp
    #[inline]
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Immutable stored entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Position in the ledger, starting at 1
    pub sequence: u64,
    /// Recorded action
    pub action: AuditAction,
    /// Plan the action applies to
    pub plan_id: String,
    /// Identity that performed the action
    pub performed_by: String,
    /// When the action was recorded
    pub created_at: DateTime<Utc>,
    /// Free-form details
    pub details: AuditDetails,
    /// Hash of the previous entry (hex)
    pub prev_hash: String,
    /// Hash of this entry (hex)
    pub hash: String,
}

impl AuditLogEntry {
    pub(crate) fn seal(sequence: u64, entry: NewAuditEntry, created_at: DateTime<Utc>, prev_hash: String) -> Self {
        let mut sealed = Self {
            sequence,
            action: entry.action,
            plan_id: entry.plan_id,
            performed_by: entry.performed_by,
            created_at,
            details: entry.details,
            prev_hash,
            hash: String::new(),
        };
        sealed.hash = sealed.compute_hash();
        sealed
    }

    /// Recompute the hash from the entry's content
    #[must_use]
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sequence.to_le_bytes());
        hasher.update(self.action.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(self.plan_id.as_bytes());
        hasher.update([0]);
        hasher.update(self.performed_by.as_bytes());
        hasher.update([0]);
        hasher.update(self.created_at.timestamp_micros().to_le_bytes());
        // BTreeMap keeps key order stable; Value serialization cannot fail
        hasher.update(serde_json::to_vec(&self.details).unwrap_or_default());
        hasher.update([0]);
        hasher.update(self.prev_hash.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Hash preceding the first entry
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";
