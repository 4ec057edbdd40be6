//! Plan lifecycle controller
//!
//! State machine over `ActionPlan::status`:
//!
//! ```text
//! PLANNED -> APPROVED -> EXECUTED -> ROLLED_BACK
//! ```
//!
//! Each transition runs under a per-plan async mutex, re-evaluates the
//! stage's guardrails against the stored plan, writes the plan with a
//! version check and then appends the audit entry. When the audit append
//! fails the previous plan content is written back, so callers see both
//! writes or neither.

use crate::config::PlannerConfig;
use crate::error::{require, with_timeout, FopError};
use crate::store::{AuditSink, PlanRepository, StoreError};
use chrono::Utc;
use dashmap::DashMap;
use fop_guardrails::{GuardrailPolicy, GuardrailViolation, Stage};
use fop_ledger::{AuditAction, AuditDetails, AuditLogEntry, NewAuditEntry};
use fop_model::{ActionPlan, ExecutionDetails, ExecutionSettings, GuardrailId, PlanId, PlanStatus};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Reason recorded when a rollback names none
pub const DEFAULT_ROLLBACK_REASON: &str = "Manual rollback requested";

/// Statuses reachable from `from`
#[must_use]
pub fn allowed_transitions(from: PlanStatus) -> &'static [PlanStatus] {
    use PlanStatus::*;
    match from {
        Planned => &[Approved],
        Approved => &[Executed],
        Executed => &[RolledBack],
        RolledBack => &[],
    }
}

/// Check a transition against the table
///
/// # Errors
/// - `FopError::InvalidTransition` if `to` is not reachable from `from`
pub fn validate_transition(plan_id: &PlanId, from: PlanStatus, to: PlanStatus) -> Result<(), FopError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(FopError::InvalidTransition {
            plan_id: plan_id.to_string(),
            from,
            to,
        })
    }
}

fn stage_for(to: PlanStatus) -> Stage {
    match to {
        PlanStatus::Planned | PlanStatus::Approved => Stage::Approve,
        PlanStatus::Executed => Stage::Execute,
        PlanStatus::RolledBack => Stage::Rollback,
    }
}

fn action_for(to: PlanStatus) -> AuditAction {
    match to {
        PlanStatus::Planned => AuditAction::PlanGenerated,
        PlanStatus::Approved => AuditAction::PlanApproved,
        PlanStatus::Executed => AuditAction::PlanExecuted,
        PlanStatus::RolledBack => AuditAction::PlanRolledBack,
    }
}

/// Drives plans through their lifecycle
pub struct LifecycleController {
    repository: Arc<dyn PlanRepository>,
    audit: Arc<dyn AuditSink>,
    policy: GuardrailPolicy,
    execution: ExecutionSettings,
    storage_timeout: Duration,
    locks: DashMap<PlanId, Arc<Mutex<()>>>,
}

impl LifecycleController {
    /// Create controller
    #[must_use]
    pub fn new(config: &PlannerConfig, repository: Arc<dyn PlanRepository>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            repository,
            audit,
            policy: config.policy(),
            execution: config.execution_settings(),
            storage_timeout: config.timeouts.storage(),
            locks: DashMap::new(),
        }
    }

    /// Record the creation of a freshly generated plan
    ///
    /// # Errors
    /// - `FopError::Ledger` if the entry is rejected
    pub fn record_generated(
        &self,
        plan: &ActionPlan,
        performed_by: &str,
        extra: AuditDetails,
    ) -> Result<Arc<AuditLogEntry>, FopError> {
        let mut entry = NewAuditEntry::new(AuditAction::PlanGenerated, plan.plan_id.as_str(), performed_by)
            .with_detail("env", plan.env.as_str())
            .with_detail("resources", plan.resource_count())
            .with_detail("est_total_savings_usd_month", plan.est_total_savings_usd_month);
        entry.details.extend(extra);
        Ok(self.audit.append(entry)?)
    }

    /// PLANNED -> APPROVED
    ///
    /// # Errors
    /// - `ValidationError::EmptyField` for a blank actor
    /// - `FopError::NotFound` for an unknown plan
    /// - `FopError::InvalidTransition` unless the plan is PLANNED
    /// - `GuardrailViolation` if ENV_SCOPE, BLAST_RADIUS or ROLLBACK_PRESENT fails
    pub async fn approve(&self, plan_id: &PlanId, actor: &str) -> Result<ActionPlan, FopError> {
        self.transition(plan_id, actor, PlanStatus::Approved, None).await
    }

    /// APPROVED -> EXECUTED (simulated)
    ///
    /// # Errors
    /// - as [`LifecycleController::approve`], with all four guardrails and
    ///   APPROVED as the required source state
    pub async fn execute(&self, plan_id: &PlanId, actor: &str) -> Result<ActionPlan, FopError> {
        self.transition(plan_id, actor, PlanStatus::Executed, None).await
    }

    /// EXECUTED -> ROLLED_BACK
    ///
    /// # Errors
    /// - as [`LifecycleController::approve`], with ROLLBACK_PRESENT only and
    ///   EXECUTED as the required source state
    pub async fn rollback(&self, plan_id: &PlanId, actor: &str, reason: Option<String>) -> Result<ActionPlan, FopError> {
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ROLLBACK_REASON.to_string());
        self.transition(plan_id, actor, PlanStatus::RolledBack, Some(reason)).await
    }

    async fn transition(
        &self,
        plan_id: &PlanId,
        actor: &str,
        to: PlanStatus,
        reason: Option<String>,
    ) -> Result<ActionPlan, FopError> {
        require("actor", actor)?;

        let lock = Arc::clone(self.locks.entry(plan_id.clone()).or_default().value());
        let result = {
            let _guard = lock.lock().await;
            self.apply(plan_id, actor, to, reason).await
        };
        drop(lock);
        // nobody else holds or waits on the mutex once only the map owns it
        self.locks.remove_if(plan_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn apply(
        &self,
        plan_id: &PlanId,
        actor: &str,
        to: PlanStatus,
        reason: Option<String>,
    ) -> Result<ActionPlan, FopError> {
        let current = self.load(plan_id).await?;
        let from = current.status;
        if let Err(err) = validate_transition(plan_id, current.status, to) {
            tracing::warn!(%plan_id, %actor, %from, %to, "transition refused");
            return Err(err);
        }
        let passed = self.policy.evaluate(&current, stage_for(to))?;

        let now = Utc::now();
        let mut next = current.clone();
        next.status = to;
        let mut entry =
            NewAuditEntry::new(action_for(to), plan_id.as_str(), actor).with_detail("from", from.as_str());
        match to {
            PlanStatus::Approved => {
                next.approved_by = Some(actor.to_string());
                next.approved_at = Some(now);
                entry = entry.with_detail("guardrails_checked", json!(passed));
            }
            PlanStatus::Executed => {
                if !current.env.is_mutable() {
                    return Err(GuardrailViolation::new(
                        GuardrailId::EnvScope,
                        format!("refusing to execute a {} plan", current.env),
                    )
                    .into());
                }
                let details = ExecutionDetails::simulate(plan_id.as_str(), &current.top_opportunities, &self.execution);
                entry = entry.with_detail("execution_details", json!(details));
                next.executed_at = Some(now);
                next.execution_details = Some(details);
            }
            PlanStatus::RolledBack => {
                entry = entry.with_detail("reason", reason.clone().unwrap_or_default());
                next.rolled_back_at = Some(now);
                next.rollback_reason = reason;
            }
            PlanStatus::Planned => {}
        }

        let stored = self.store(next, &current).await?;

        if let Err(err) = self.audit.append(entry) {
            tracing::warn!(%plan_id, error = %err, "audit append failed; reverting plan");
            let revert = with_timeout(
                "plan store revert",
                self.storage_timeout,
                self.repository.update(current, stored.version),
            )
            .await;
            if let Err(revert_err) = revert {
                tracing::error!(%plan_id, error = %revert_err, "plan revert failed");
            }
            return Err(err.into());
        }

        tracing::info!(%plan_id, %actor, %from, %to, "plan transitioned");
        Ok(stored)
    }

    async fn load(&self, plan_id: &PlanId) -> Result<ActionPlan, FopError> {
        with_timeout("plan store get", self.storage_timeout, self.repository.get(plan_id))
            .await?
            .ok_or_else(|| FopError::plan_not_found(plan_id.as_str()))
    }

    async fn store(&self, next: ActionPlan, current: &ActionPlan) -> Result<ActionPlan, FopError> {
        let to = next.status;
        let update = self.repository.update(next, current.version);
        match tokio::time::timeout(self.storage_timeout, update).await {
            Ok(Ok(stored)) => Ok(stored),
            Ok(Err(StoreError::Conflict { .. })) => {
                tracing::warn!(plan_id = %current.plan_id, %to, "lost concurrent update");
                Err(FopError::InvalidTransition {
                    plan_id: current.plan_id.to_string(),
                    from: current.status,
                    to,
                })
            }
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(FopError::UpstreamTimeout {
                operation: "plan store update".to_string(),
                timeout_ms: u64::try_from(self.storage_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("policy", &self.policy)
            .field("execution", &self.execution)
            .field("locked_plans", &self.locks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> PlanId {
        PlanId::new(raw).unwrap()
    }

    #[test]
    fn transition_table() {
        assert_eq!(allowed_transitions(PlanStatus::Planned), &[PlanStatus::Approved]);
        assert_eq!(allowed_transitions(PlanStatus::Approved), &[PlanStatus::Executed]);
        assert_eq!(allowed_transitions(PlanStatus::Executed), &[PlanStatus::RolledBack]);
        assert!(allowed_transitions(PlanStatus::RolledBack).is_empty());
    }

    #[test]
    fn nothing_returns_to_planned() {
        for from in [PlanStatus::Planned, PlanStatus::Approved, PlanStatus::Executed, PlanStatus::RolledBack] {
            assert!(validate_transition(&id("p"), from, PlanStatus::Planned).is_err());
        }
    }

    #[test]
    fn skipping_states_is_refused() {
        let err = validate_transition(&id("p"), PlanStatus::Planned, PlanStatus::Executed).unwrap_err();
        assert!(matches!(
            err,
            FopError::InvalidTransition {
                from: PlanStatus::Planned,
                to: PlanStatus::Executed,
                ..
            }
        ));
        assert!(validate_transition(&id("p"), PlanStatus::Approved, PlanStatus::RolledBack).is_err());
    }

    #[tokio::test]
    async fn plan_locks_are_released_after_transitions() {
        use crate::store::InMemoryPlanRepository;
        use fop_ledger::AuditLedger;
        use fop_model::{Environment, Opportunity, OpportunityType, RiskLevel, Service};

        let repository = Arc::new(InMemoryPlanRepository::new());
        let ledger = Arc::new(AuditLedger::new());
        let controller = LifecycleController::new(&PlannerConfig::default(), repository.clone(), ledger);

        let opportunity = Opportunity::new(
            "o1",
            Service::Ec2,
            OpportunityType::Ec2Offhours,
            "i-1",
            Environment::Dev,
            RiskLevel::Low,
            10.0,
        );
        let plan = ActionPlan {
            plan_id: id("plan-locks"),
            objective: "Stop idle dev instances".to_string(),
            env: Environment::Dev,
            est_total_savings_usd_month: 10.0,
            top_opportunities: vec![opportunity],
            recommended_steps: vec!["Stop i-1 during 19:00-07:00".to_string()],
            guardrails_checked: GuardrailId::ALL.to_vec(),
            rollback_plan: vec!["Start i-1".to_string()],
            maintenance_window: "19:00-07:00".to_string(),
            reported_total_usd_month: None,
            status: PlanStatus::Planned,
            version: 0,
            created_at: Utc::now(),
            created_by: "ops".to_string(),
            approved_by: None,
            approved_at: None,
            executed_at: None,
            execution_details: None,
            rolled_back_at: None,
            rollback_reason: None,
        };
        repository.create(plan).await.unwrap();

        let plan_id = id("plan-locks");
        controller.approve(&plan_id, "ops").await.unwrap();
        assert!(controller.locks.is_empty());

        assert!(controller.rollback(&plan_id, "ops", None).await.is_err());
        assert!(controller.locks.is_empty());

        let (a, b) = tokio::join!(controller.execute(&plan_id, "ops"), controller.execute(&plan_id, "ops"));
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(controller.locks.is_empty());
    }

    #[test]
    fn stages_match_targets() {
        assert_eq!(stage_for(PlanStatus::Approved), Stage::Approve);
        assert_eq!(stage_for(PlanStatus::Executed), Stage::Execute);
        assert_eq!(stage_for(PlanStatus::RolledBack), Stage::Rollback);
        assert_eq!(action_for(PlanStatus::RolledBack), AuditAction::PlanRolledBack);
    }
}
