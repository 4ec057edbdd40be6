//! Guardrail policy evaluator
//!
//! Each lifecycle stage re-runs its own subset of the rules against the
//! plan's current fields.

use crate::error::GuardrailViolation;
use crate::window::references_window;
use fop_model::{ActionPlan, GuardrailId, MAX_BLAST_RADIUS};

/// Point in the lifecycle at which the policy runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Candidate plan before it is persisted
    Creation,
    /// PLANNED -> APPROVED
    Approve,
    /// APPROVED -> EXECUTED
    Execute,
    /// EXECUTED -> ROLLED_BACK
    Rollback,
}

impl Stage {
    /// Rules evaluated at this stage, in canonical order
    #[must_use]
    pub fn rules(&self) -> &'static [GuardrailId] {
        use GuardrailId::*;
        match self {
            Stage::Creation | Stage::Execute => &[EnvScope, BlastRadius, RollbackPresent, WindowDefined],
            Stage::Approve => &[EnvScope, BlastRadius, RollbackPresent],
            Stage::Rollback => &[RollbackPresent],
        }
    }
}

/// Pure, side-effect-free guardrail evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardrailPolicy {
    max_resources: usize,
}

impl GuardrailPolicy {
    /// Create policy with the default blast radius
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_resources: MAX_BLAST_RADIUS,
        }
    }

    /// With a tighter blast radius (never looser than the hard limit)
    #[inline]
    #[must_use]
    pub fn with_max_resources(mut self, max: usize) -> Self {
        self.max_resources = max.min(MAX_BLAST_RADIUS);
        self
    }

    /// Effective blast radius
    #[inline]
    #[must_use]
    pub fn max_resources(&self) -> usize {
        self.max_resources
    }

    /// Evaluate the stage's rules against the plan
    ///
    /// # Returns
    /// Satisfied guardrails, in evaluation order
    ///
    /// # Errors
    /// - `GuardrailViolation` naming the first failing rule
    pub fn evaluate(&self, plan: &ActionPlan, stage: Stage) -> Result<Vec<GuardrailId>, GuardrailViolation> {
        let mut passed = Vec::with_capacity(stage.rules().len());
        for rule in stage.rules() {
            if let Err(violation) = self.check(*rule, plan) {
                tracing::warn!(
                    plan_id = %plan.plan_id,
                    guardrail = %violation.guardrail,
                    ?stage,
                    "guardrail rejected plan: {}",
                    violation.reason
                );
                return Err(violation);
            }
            passed.push(*rule);
        }
        Ok(passed)
    }

    /// Evaluate a single rule
    ///
    /// # Errors
    /// - `GuardrailViolation` if the rule fails
    pub fn check(&self, rule: GuardrailId, plan: &ActionPlan) -> Result<(), GuardrailViolation> {
        match rule {
            GuardrailId::EnvScope => Self::check_env_scope(plan),
            GuardrailId::BlastRadius => self.check_blast_radius(plan),
            GuardrailId::RollbackPresent => Self::check_rollback(plan),
            GuardrailId::WindowDefined => Self::check_window(plan),
        }
    }

    fn check_env_scope(plan: &ActionPlan) -> Result<(), GuardrailViolation> {
        if !plan.env.is_mutable() {
            return Err(GuardrailViolation::new(
                GuardrailId::EnvScope,
                format!("plan env is {}", plan.env),
            ));
        }
        if let Some(opp) = plan.top_opportunities.iter().find(|o| !o.env.is_mutable()) {
            return Err(GuardrailViolation::new(
                GuardrailId::EnvScope,
                format!("opportunity {} ({}) is in {}", opp.id, opp.resource, opp.env),
            ));
        }
        Ok(())
    }

    fn check_blast_radius(&self, plan: &ActionPlan) -> Result<(), GuardrailViolation> {
        let count = plan.resource_count();
        if count > self.max_resources {
            return Err(GuardrailViolation::new(
                GuardrailId::BlastRadius,
                format!("plan touches {count} resources (max {})", self.max_resources),
            ));
        }
        Ok(())
    }

    fn check_rollback(plan: &ActionPlan) -> Result<(), GuardrailViolation> {
        if plan.rollback_plan.iter().all(|step| step.trim().is_empty()) {
            return Err(GuardrailViolation::new(
                GuardrailId::RollbackPresent,
                "rollback plan has no steps",
            ));
        }
        Ok(())
    }

    fn check_window(plan: &ActionPlan) -> Result<(), GuardrailViolation> {
        let declared = !plan.maintenance_window.trim().is_empty();
        if declared || plan.recommended_steps.iter().any(|s| references_window(s)) {
            return Ok(());
        }
        Err(GuardrailViolation::new(
            GuardrailId::WindowDefined,
            "no maintenance window declared or referenced by any step",
        ))
    }
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self::new()
    }
}
