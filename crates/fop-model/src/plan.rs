//! Action plans
//!
//! A plan bundles at most five opportunities with the steps to apply them and
//! the steps to undo them. Status moves forward only:
//!
//! ```text
//! PLANNED -> APPROVED -> EXECUTED -> ROLLED_BACK
//! ```

use crate::error::ModelError;
use crate::execution::ExecutionDetails;
use crate::guardrail::GuardrailId;
use crate::ids::PlanId;
use crate::opportunity::{Environment, Opportunity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    /// Generated, awaiting approval
    Planned,
    /// Approved by a person
    Approved,
    /// Executed (simulated)
    Executed,
    /// Rolled back (terminal)
    RolledBack,
}

impl PlanStatus {
    /// Position in the lifecycle
    #[inline]
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            PlanStatus::Planned => 0,
            PlanStatus::Approved => 1,
            PlanStatus::Executed => 2,
            PlanStatus::RolledBack => 3,
        }
    }

    /// Whether the plan has been approved at some point
    #[inline]
    #[must_use]
    pub fn has_approval(&self) -> bool {
        self.rank() >= PlanStatus::Approved.rank()
    }

    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::RolledBack)
    }

    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Planned => "PLANNED",
            PlanStatus::Approved => "APPROVED",
            PlanStatus::Executed => "EXECUTED",
            PlanStatus::RolledBack => "ROLLED_BACK",
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reviewed, guardrail-checked bundle of opportunities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    /// Unique identifier
    pub plan_id: PlanId,
    /// What the plan accomplishes
    pub objective: String,
    /// Target environment (never PROD)
    pub env: Environment,
    /// Selected opportunities, highest savings first
    pub top_opportunities: Vec<Opportunity>,
    /// Ordered steps to apply
    pub recommended_steps: Vec<String>,
    /// Guardrails that passed at creation
    pub guardrails_checked: Vec<GuardrailId>,
    /// Ordered steps to undo
    pub rollback_plan: Vec<String>,
    /// Maintenance window the change is confined to
    #[serde(default)]
    pub maintenance_window: String,
    /// Sum of the selected opportunities' savings
    pub est_total_savings_usd_month: f64,
    /// Total claimed by the recommendation generator (advisory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_total_usd_month: Option<f64>,
    /// Lifecycle status
    pub status: PlanStatus,
    /// Store revision, bumped on every write
    #[serde(default)]
    pub version: u64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Requester identity
    pub created_by: String,
    /// Approver identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    /// Approval time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    /// Execution time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    /// Simulated execution record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_details: Option<ExecutionDetails>,
    /// Rollback time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolled_back_at: Option<DateTime<Utc>>,
    /// Why the plan was rolled back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_reason: Option<String>,
}

impl ActionPlan {
    /// Number of resources the plan touches
    #[inline]
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.top_opportunities.len()
    }

    /// Difference between the generator's total and the computed total,
    /// if it exceeds `tolerance`
    #[must_use]
    pub fn savings_divergence(&self, tolerance: f64) -> Option<f64> {
        let reported = self.reported_total_usd_month?;
        let delta = reported - self.est_total_savings_usd_month;
        (delta.abs() > tolerance).then_some(delta)
    }

    /// Check that status-dependent fields are present exactly when required
    ///
    /// # Errors
    /// - `ModelError::InconsistentPlan` describing the first mismatch
    pub fn check_consistency(&self) -> Result<(), ModelError> {
        let approved = self.approved_by.is_some() && self.approved_at.is_some();
        if approved != self.status.has_approval() {
            return Err(self.inconsistent(format!(
                "approval fields present={approved} but status is {}",
                self.status
            )));
        }

        let executed = self.executed_at.is_some() && self.execution_details.is_some();
        let expects_execution = matches!(self.status, PlanStatus::Executed | PlanStatus::RolledBack);
        if executed != expects_execution {
            return Err(self.inconsistent(format!(
                "execution fields present={executed} but status is {}",
                self.status
            )));
        }

        if self.rolled_back_at.is_some() != self.status.is_terminal() {
            return Err(self.inconsistent(format!(
                "rollback timestamp does not match status {}",
                self.status
            )));
        }
        Ok(())
    }

    fn inconsistent(&self, reason: String) -> ModelError {
        ModelError::InconsistentPlan {
            plan_id: self.plan_id.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opportunity::{OpportunityType, RiskLevel, Service};

    fn planned() -> ActionPlan {
        ActionPlan {
            plan_id: PlanId::new("plan-test").unwrap(),
            objective: "Stop idle dev instances".to_string(),
            env: Environment::Dev,
            top_opportunities: vec![Opportunity::new(
                "o1",
                Service::Ec2,
                OpportunityType::Ec2Offhours,
                "i-1",
                Environment::Dev,
                RiskLevel::Low,
                100.0,
            )],
            recommended_steps: vec!["Schedule stop".to_string()],
            guardrails_checked: GuardrailId::ALL.to_vec(),
            rollback_plan: vec!["Re-enable 24/7 schedule".to_string()],
            maintenance_window: "19:00-07:00".to_string(),
            est_total_savings_usd_month: 100.0,
            reported_total_usd_month: None,
            status: PlanStatus::Planned,
            version: 1,
            created_at: Utc::now(),
            created_by: "ops@example.com".to_string(),
            approved_by: None,
            approved_at: None,
            executed_at: None,
            execution_details: None,
            rolled_back_at: None,
            rollback_reason: None,
        }
    }

    #[test]
    fn status_ranks_are_monotonic() {
        assert!(PlanStatus::Planned.rank() < PlanStatus::Approved.rank());
        assert!(PlanStatus::Executed.rank() < PlanStatus::RolledBack.rank());
        assert!(PlanStatus::RolledBack.has_approval());
        assert!(!PlanStatus::Planned.has_approval());
    }

    #[test]
    fn status_wire_names() {
        let json = serde_json::to_string(&PlanStatus::RolledBack).unwrap();
        assert_eq!(json, "\"ROLLED_BACK\"");
    }

    #[test]
    fn fresh_plan_is_consistent() {
        assert!(planned().check_consistency().is_ok());
    }

    #[test]
    fn approved_without_approver_is_inconsistent() {
        let mut plan = planned();
        plan.status = PlanStatus::Approved;
        assert!(matches!(
            plan.check_consistency(),
            Err(ModelError::InconsistentPlan { .. })
        ));
    }

    #[test]
    fn divergence_only_beyond_tolerance() {
        let mut plan = planned();
        assert_eq!(plan.savings_divergence(0.01), None);

        plan.reported_total_usd_month = Some(100.005);
        assert_eq!(plan.savings_divergence(0.01), None);

        plan.reported_total_usd_month = Some(150.0);
        assert_eq!(plan.savings_divergence(0.01), Some(50.0));
    }

    #[test]
    fn plan_json_roundtrip_keeps_status() {
        let plan = planned();
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["status"], "PLANNED");
        assert_eq!(json["guardrails_checked"][0], "ENV_SCOPE");
        let back: ActionPlan = serde_json::from_value(json).unwrap();
        assert_eq!(back, plan);
    }
}
