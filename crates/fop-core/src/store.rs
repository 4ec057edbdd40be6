//! Persistence boundaries
//!
//! Plans live behind [`PlanRepository`], a versioned document store: every
//! update names the version it was read at, and a stale version is refused.
//! Audit writes go through [`AuditSink`], implemented by the in-process
//! ledger.

use crate::error::{FopError, ValidationError};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fop_ledger::{AuditLedger, AuditLogEntry, LedgerError, NewAuditEntry};
use fop_model::{ActionPlan, PlanId};
use std::sync::Arc;

/// Plan store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Version check failed
    #[error("plan {plan_id} was modified concurrently (expected v{expected}, found v{actual})")]
    Conflict {
        /// Plan id
        plan_id: String,
        /// Version the caller read
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// Create with an id that exists
    #[error("plan {0} already exists")]
    Duplicate(String),

    /// Update of an id that does not exist
    #[error("plan {0} not found")]
    Missing(String),

    /// Backend failure
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for FopError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(id) => ValidationError::DuplicatePlanId(id).into(),
            StoreError::Missing(id) => FopError::plan_not_found(id),
            other => FopError::upstream("plan store", other.to_string()),
        }
    }
}

/// Versioned plan storage
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Insert a new plan at version 1
    async fn create(&self, plan: ActionPlan) -> Result<ActionPlan, StoreError>;

    /// Fetch a plan
    async fn get(&self, plan_id: &PlanId) -> Result<Option<ActionPlan>, StoreError>;

    /// Replace a plan if it is still at `expected_version`; the stored copy
    /// gets `expected_version + 1`
    async fn update(&self, plan: ActionPlan, expected_version: u64) -> Result<ActionPlan, StoreError>;

    /// All plans, in no particular order
    async fn list(&self) -> Result<Vec<ActionPlan>, StoreError>;
}

/// Plan store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryPlanRepository {
    plans: DashMap<PlanId, ActionPlan>,
}

impl InMemoryPlanRepository {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanRepository for InMemoryPlanRepository {
    async fn create(&self, mut plan: ActionPlan) -> Result<ActionPlan, StoreError> {
        match self.plans.entry(plan.plan_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(plan.plan_id.to_string())),
            Entry::Vacant(slot) => {
                plan.version = 1;
                slot.insert(plan.clone());
                Ok(plan)
            }
        }
    }

    async fn get(&self, plan_id: &PlanId) -> Result<Option<ActionPlan>, StoreError> {
        Ok(self.plans.get(plan_id).map(|p| p.clone()))
    }

    async fn update(&self, mut plan: ActionPlan, expected_version: u64) -> Result<ActionPlan, StoreError> {
        let mut stored = self
            .plans
            .get_mut(&plan.plan_id)
            .ok_or_else(|| StoreError::Missing(plan.plan_id.to_string()))?;
        if stored.version != expected_version {
            return Err(StoreError::Conflict {
                plan_id: plan.plan_id.to_string(),
                expected: expected_version,
                actual: stored.version,
            });
        }
        plan.version = expected_version + 1;
        *stored = plan.clone();
        Ok(plan)
    }

    async fn list(&self) -> Result<Vec<ActionPlan>, StoreError> {
        Ok(self.plans.iter().map(|p| p.value().clone()).collect())
    }
}

/// Destination of audit writes
pub trait AuditSink: Send + Sync {
    /// Append one entry
    ///
    /// # Errors
    /// - `LedgerError::InvalidEntry` if the entry is rejected
    fn append(&self, entry: NewAuditEntry) -> Result<Arc<AuditLogEntry>, LedgerError>;
}

impl AuditSink for AuditLedger {
    fn append(&self, entry: NewAuditEntry) -> Result<Arc<AuditLogEntry>, LedgerError> {
        AuditLedger::append(self, entry)
    }
}
