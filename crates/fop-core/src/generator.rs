//! Plan generator
//!
//! Turns an opportunity set into a persisted PLANNED plan:
//! 1. Filter by env/risk, drop PROD, stable-sort by savings, keep the top N
//! 2. Sum the selected savings locally
//! 3. Ask the recommendation generator for prose, parse strictly
//! 4. Run the Creation guardrails
//! 5. Persist
//!
//! Any failure before step 5 leaves nothing behind.

use crate::config::PlannerConfig;
use crate::error::{require, with_timeout, FopError, ValidationError};
use crate::recommender::{PlanOrigin, Recommendation, RecommendationGenerator, RecommendationRequest};
use crate::store::PlanRepository;
use chrono::Utc;
use fop_guardrails::{GuardrailPolicy, GuardrailViolation, Stage};
use fop_model::{
    ActionPlan, EnvFilter, Environment, GuardrailId, Opportunity, PlanId, PlanStatus, RiskFilter,
};
use std::sync::Arc;
use std::time::Duration;

/// Parameters of one generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    /// Environment filter
    pub env: EnvFilter,
    /// Risk filter
    pub risk: RiskFilter,
    /// Identity asking for the plan
    pub requester: String,
    /// Caller-supplied id candidate
    pub plan_id: Option<PlanId>,
    /// Interactive or agent-driven
    pub origin: PlanOrigin,
}

impl PlanRequest {
    /// Interactive request with pass-through filters
    #[must_use]
    pub fn new(requester: impl Into<String>) -> Self {
        Self {
            env: EnvFilter::All,
            risk: RiskFilter::All,
            requester: requester.into(),
            plan_id: None,
            origin: PlanOrigin::Interactive,
        }
    }

    /// With environment filter
    #[inline]
    #[must_use]
    pub fn with_env(mut self, env: EnvFilter) -> Self {
        self.env = env;
        self
    }

    /// With risk filter
    #[inline]
    #[must_use]
    pub fn with_risk(mut self, risk: RiskFilter) -> Self {
        self.risk = risk;
        self
    }

    /// With a caller-chosen plan id
    #[inline]
    #[must_use]
    pub fn with_plan_id(mut self, plan_id: PlanId) -> Self {
        self.plan_id = Some(plan_id);
        self
    }

    /// Mark as agent-driven
    #[inline]
    #[must_use]
    pub fn automatic(mut self) -> Self {
        self.origin = PlanOrigin::Automatic;
        self
    }
}

/// Select the opportunities a plan would contain
///
/// Keeps records passing both filters whose environment is mutable, orders
/// them by savings descending (stable, so ties keep input order) and keeps
/// at most `limit`.
#[must_use]
pub fn select_opportunities(
    opportunities: &[Opportunity],
    env: EnvFilter,
    risk: RiskFilter,
    limit: usize,
) -> Vec<Opportunity> {
    let mut eligible: Vec<Opportunity> = opportunities
        .iter()
        .filter(|o| o.env.is_mutable() && env.matches(o) && risk.matches(o))
        .cloned()
        .collect();
    eligible.sort_by(|a, b| b.est_savings_usd_month.total_cmp(&a.est_savings_usd_month));
    eligible.truncate(limit);
    eligible
}

/// Environment a plan over `selected` targets
///
/// The filtered environment when one was given, the shared environment
/// when all selected records agree, DEV otherwise.
#[must_use]
pub fn plan_environment(env: EnvFilter, selected: &[Opportunity]) -> Environment {
    if let EnvFilter::Only(env) = env {
        return env;
    }
    match selected.split_first() {
        Some((first, rest)) if rest.iter().all(|o| o.env == first.env) => first.env,
        _ => Environment::Dev,
    }
}

/// Builds, checks and persists candidate plans
pub struct PlanGenerator {
    recommender: Arc<dyn RecommendationGenerator>,
    repository: Arc<dyn PlanRepository>,
    policy: GuardrailPolicy,
    maintenance_window: String,
    savings_tolerance: f64,
    recommendation_timeout: Duration,
    storage_timeout: Duration,
}

impl PlanGenerator {
    /// Create generator
    #[must_use]
    pub fn new(
        config: &PlannerConfig,
        recommender: Arc<dyn RecommendationGenerator>,
        repository: Arc<dyn PlanRepository>,
    ) -> Self {
        Self {
            recommender,
            repository,
            policy: config.policy(),
            maintenance_window: config.maintenance_window.clone(),
            savings_tolerance: config.savings_tolerance_usd,
            recommendation_timeout: config.timeouts.recommendation(),
            storage_timeout: config.timeouts.storage(),
        }
    }

    /// Generate and persist a plan
    ///
    /// The caller records the `PLAN_GENERATED` audit entry.
    ///
    /// # Arguments
    /// * `opportunities` - Candidate records, in insertion order
    /// * `request` - Filters, requester and optional id
    ///
    /// # Errors
    /// - `ValidationError::EmptyField` for a blank requester
    /// - `GuardrailViolation` (ENV_SCOPE) when PROD is requested, or any
    ///   Creation-stage violation of the assembled plan
    /// - `ValidationError::NoOpportunitiesAvailable` if nothing is eligible
    /// - `FopError::RecommendationGenerationFailed` / `UpstreamTimeout` from the generator
    /// - `ValidationError::DuplicatePlanId` if the supplied id exists
    pub async fn generate(&self, opportunities: &[Opportunity], request: &PlanRequest) -> Result<ActionPlan, FopError> {
        require("requester", &request.requester)?;
        if let EnvFilter::Only(env) = request.env {
            if !env.is_mutable() {
                tracing::warn!(requester = %request.requester, "plan requested for {env}");
                return Err(GuardrailViolation::new(
                    GuardrailId::EnvScope,
                    format!("plans may not target {env}"),
                )
                .into());
            }
        }
        for opportunity in opportunities {
            opportunity.validate().map_err(ValidationError::from)?;
        }

        let selected = select_opportunities(opportunities, request.env, request.risk, self.policy.max_resources());
        if selected.is_empty() {
            return Err(ValidationError::NoOpportunitiesAvailable {
                env: request.env,
                risk: request.risk,
            }
            .into());
        }
        let env = plan_environment(request.env, &selected);
        let total: f64 = selected.iter().map(|o| o.est_savings_usd_month).sum();
        tracing::debug!(
            selected = selected.len(),
            candidates = opportunities.len(),
            total,
            "opportunities selected"
        );

        let recommendation = self
            .recommend(RecommendationRequest {
                env,
                opportunities: selected.clone(),
                est_total_savings_usd_month: total,
                maintenance_window: self.maintenance_window.clone(),
                origin: request.origin,
            })
            .await?;

        let now = Utc::now();
        let plan_id = request.plan_id.clone().unwrap_or_else(|| match request.origin {
            PlanOrigin::Interactive => PlanId::interactive(now),
            PlanOrigin::Automatic => PlanId::automatic(now),
        });
        let mut plan = ActionPlan {
            plan_id,
            objective: recommendation.objective,
            env,
            top_opportunities: selected,
            recommended_steps: recommendation.recommended_steps,
            guardrails_checked: Vec::new(),
            rollback_plan: recommendation.rollback_plan,
            maintenance_window: self.maintenance_window.clone(),
            est_total_savings_usd_month: total,
            reported_total_usd_month: recommendation.est_total_savings_usd_month,
            status: PlanStatus::Planned,
            version: 0,
            created_at: now,
            created_by: request.requester.clone(),
            approved_by: None,
            approved_at: None,
            executed_at: None,
            execution_details: None,
            rolled_back_at: None,
            rollback_reason: None,
        };

        if let Some(delta) = plan.savings_divergence(self.savings_tolerance) {
            tracing::warn!(
                plan_id = %plan.plan_id,
                computed = total,
                delta,
                "generator total diverges from computed total; keeping computed"
            );
        }

        plan.guardrails_checked = self.policy.evaluate(&plan, Stage::Creation)?;

        let repository = Arc::clone(&self.repository);
        let stored = with_timeout("plan store create", self.storage_timeout, repository.create(plan)).await?;
        tracing::info!(
            plan_id = %stored.plan_id,
            env = %stored.env,
            resources = stored.resource_count(),
            savings = stored.est_total_savings_usd_month,
            requester = %stored.created_by,
            "plan generated"
        );
        Ok(stored)
    }

    async fn recommend(&self, request: RecommendationRequest) -> Result<Recommendation, FopError> {
        let call = async {
            self.recommender
                .generate(&request)
                .await
                .map_err(|e| FopError::RecommendationGenerationFailed(e.to_string()))
        };
        let raw = with_timeout("recommendation", self.recommendation_timeout, call).await?;
        Recommendation::from_response(raw).map_err(|reason| {
            tracing::warn!(%reason, "recommendation rejected");
            FopError::RecommendationGenerationFailed(reason)
        })
    }
}

impl std::fmt::Debug for PlanGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanGenerator")
            .field("policy", &self.policy)
            .field("maintenance_window", &self.maintenance_window)
            .finish_non_exhaustive()
    }
}
