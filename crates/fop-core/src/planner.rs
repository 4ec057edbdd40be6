//! FinOps planner facade
//!
//! Wires the opportunity source, generator, lifecycle controller, audit
//! ledger and agent orchestrator together and exposes the operations a
//! transport binding (CLI, RPC) calls.

use crate::config::PlannerConfig;
use crate::error::{with_timeout, FopError, ValidationError};
use crate::generator::{PlanGenerator, PlanRequest};
use crate::lifecycle::LifecycleController;
use crate::orchestrator::{AgentKind, AgentOrchestrator, AgentOutcome, AgentRunReport, AgentStatus};
use crate::recommender::{PlanOrigin, RecommendationGenerator, TemplateRecommender};
use crate::source::{IdentityProvider, InMemoryOpportunitySource, OpportunitySource, StaticIdentity};
use crate::store::{AuditSink, InMemoryPlanRepository, PlanRepository};
use fop_ledger::{AuditCursor, AuditDetails, AuditLedger, AuditQuery};
use fop_model::{ActionPlan, EnvFilter, Opportunity, PlanId, PlanStatus, RiskFilter};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Identity used when none is configured
pub const SYSTEM_IDENTITY: &str = "system";

/// Dashboard figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerSummary {
    /// Opportunities known to the source
    pub opportunity_count: usize,
    /// Sum of their savings
    pub total_potential_savings_usd_month: f64,
    /// Mean confidence over records that carry one
    pub average_confidence: Option<f64>,
    /// Enabled agents
    pub active_agents: usize,
    /// Plan count per status
    pub plans_by_status: BTreeMap<String, usize>,
    /// Entries in the audit ledger
    pub audit_entries: usize,
}

/// Builder for [`FinOpsPlanner`]
pub struct PlannerBuilder {
    config: PlannerConfig,
    source: Arc<dyn OpportunitySource>,
    recommender: Arc<dyn RecommendationGenerator>,
    identity: Arc<dyn IdentityProvider>,
    repository: Arc<dyn PlanRepository>,
    ledger: Arc<AuditLedger>,
}

impl PlannerBuilder {
    /// With opportunity source
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn OpportunitySource>) -> Self {
        self.source = source;
        self
    }

    /// With recommendation generator
    #[must_use]
    pub fn with_recommender(mut self, recommender: Arc<dyn RecommendationGenerator>) -> Self {
        self.recommender = recommender;
        self
    }

    /// With identity provider
    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    /// With plan repository
    #[must_use]
    pub fn with_repository(mut self, repository: Arc<dyn PlanRepository>) -> Self {
        self.repository = repository;
        self
    }

    /// With a shared ledger
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<AuditLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Validate the configuration and assemble the planner
    ///
    /// # Errors
    /// - `FopError::Config` if the configuration is out of range
    pub fn build(self) -> Result<FinOpsPlanner, FopError> {
        self.config.validate()?;
        let generator = PlanGenerator::new(&self.config, self.recommender, Arc::clone(&self.repository));
        let lifecycle = LifecycleController::new(
            &self.config,
            Arc::clone(&self.repository),
            Arc::clone(&self.ledger) as Arc<dyn AuditSink>,
        );
        let agents = AgentOrchestrator::new(&self.config);
        Ok(FinOpsPlanner {
            storage_timeout: self.config.timeouts.storage(),
            config: self.config,
            source: self.source,
            identity: self.identity,
            repository: self.repository,
            ledger: self.ledger,
            generator,
            lifecycle,
            agents,
        })
    }
}

/// Plan generation and lifecycle engine
pub struct FinOpsPlanner {
    config: PlannerConfig,
    storage_timeout: Duration,
    source: Arc<dyn OpportunitySource>,
    identity: Arc<dyn IdentityProvider>,
    repository: Arc<dyn PlanRepository>,
    ledger: Arc<AuditLedger>,
    generator: PlanGenerator,
    lifecycle: LifecycleController,
    agents: AgentOrchestrator,
}

impl FinOpsPlanner {
    /// Start a builder with in-memory stores, the template recommender and
    /// no opportunities
    #[must_use]
    pub fn builder(config: PlannerConfig) -> PlannerBuilder {
        PlannerBuilder {
            config,
            source: Arc::new(InMemoryOpportunitySource::default()),
            recommender: Arc::new(TemplateRecommender),
            identity: Arc::new(StaticIdentity::new(SYSTEM_IDENTITY)),
            repository: Arc::new(InMemoryPlanRepository::new()),
            ledger: Arc::new(AuditLedger::new()),
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Current verified identity
    ///
    /// # Errors
    /// - `ValidationError::EmptyField` if nobody is authenticated
    pub fn current_user(&self) -> Result<String, FopError> {
        self.identity
            .current_user()
            .ok_or_else(|| ValidationError::EmptyField("current user").into())
    }

    /// Opportunities from the source, filtered
    ///
    /// # Errors
    /// - `FopError::UpstreamFailure` / `UpstreamTimeout` from the source
    pub async fn list_opportunities(&self, env: EnvFilter, risk: RiskFilter) -> Result<Vec<Opportunity>, FopError> {
        let call = async {
            self.source
                .list_opportunities(env, risk)
                .await
                .map_err(|e| FopError::upstream("list opportunities", e.to_string()))
        };
        with_timeout("list opportunities", self.storage_timeout, call).await
    }

    /// Generate a plan from the source's opportunities and record it
    ///
    /// # Errors
    /// See [`PlanGenerator::generate`]
    pub async fn generate_plan(&self, request: PlanRequest) -> Result<ActionPlan, FopError> {
        let opportunities = self.list_opportunities(request.env, request.risk).await?;
        self.generate_plan_from(&opportunities, request).await
    }

    /// Generate a plan from caller-supplied opportunities and record it
    ///
    /// # Errors
    /// See [`PlanGenerator::generate`]
    pub async fn generate_plan_from(&self, opportunities: &[Opportunity], request: PlanRequest) -> Result<ActionPlan, FopError> {
        let plan = self.generator.generate(opportunities, &request).await?;
        let mut details = AuditDetails::new();
        details.insert("origin".to_string(), json!(request.origin));
        self.lifecycle.record_generated(&plan, &request.requester, details)?;
        Ok(plan)
    }

    /// Approve a PLANNED plan
    ///
    /// # Errors
    /// See [`LifecycleController::approve`]
    pub async fn approve(&self, plan_id: &PlanId, actor: &str) -> Result<ActionPlan, FopError> {
        self.lifecycle.approve(plan_id, actor).await
    }

    /// Execute (simulate) an APPROVED plan
    ///
    /// # Errors
    /// See [`LifecycleController::execute`]
    pub async fn execute(&self, plan_id: &PlanId, actor: &str) -> Result<ActionPlan, FopError> {
        self.lifecycle.execute(plan_id, actor).await
    }

    /// Roll back an EXECUTED plan
    ///
    /// # Errors
    /// See [`LifecycleController::rollback`]
    pub async fn rollback(&self, plan_id: &PlanId, actor: &str, reason: Option<String>) -> Result<ActionPlan, FopError> {
        self.lifecycle.rollback(plan_id, actor, reason).await
    }

    /// Fetch one plan
    ///
    /// # Errors
    /// - `FopError::NotFound` for an unknown id
    pub async fn get_plan(&self, plan_id: &PlanId) -> Result<ActionPlan, FopError> {
        with_timeout("plan store get", self.storage_timeout, self.repository.get(plan_id))
            .await?
            .ok_or_else(|| FopError::plan_not_found(plan_id.as_str()))
    }

    /// All plans, newest first
    ///
    /// # Errors
    /// - `FopError::UpstreamFailure` / `UpstreamTimeout` from the store
    pub async fn list_plans(&self) -> Result<Vec<ActionPlan>, FopError> {
        let mut plans = with_timeout("plan store list", self.storage_timeout, self.repository.list()).await?;
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.plan_id.cmp(&a.plan_id)));
        Ok(plans)
    }

    /// Lazy listing over the audit ledger
    #[must_use]
    pub fn list_audit_log(&self, query: AuditQuery) -> AuditCursor {
        self.ledger.list(query)
    }

    /// Verify the audit hash chain
    ///
    /// # Errors
    /// - `FopError::Ledger` at the first broken link
    pub fn verify_audit_log(&self) -> Result<(), FopError> {
        Ok(self.ledger.verify_integrity()?)
    }

    /// Flip an agent's enabled flag
    ///
    /// # Errors
    /// - `FopError::NotFound` for an unregistered agent
    pub fn toggle_agent(&self, kind: AgentKind) -> Result<bool, FopError> {
        self.agents.toggle(kind)
    }

    /// Snapshot of every agent
    #[must_use]
    pub fn agents(&self) -> Vec<AgentStatus> {
        self.agents.statuses()
    }

    /// Run one agent as the current user
    ///
    /// Discovery and optimiser runs generate an automatic plan over all
    /// DEV/TEST opportunities and record `PLAN_GENERATED` with
    /// `{agent, auto_generated: true}`. Monitor and assistant runs do nothing
    /// beyond reporting.
    ///
    /// # Errors
    /// - `FopError::AgentDisabled` before anything else is checked
    /// - `ValidationError::EmptyField` if nobody is authenticated
    /// - `FopError::AlreadyRunning` from the orchestrator
    /// - any generation error
    pub async fn run_agent(&self, kind: AgentKind) -> Result<AgentRunReport, FopError> {
        self.agents.ensure_enabled(kind)?;
        let performed_by = self.current_user()?;
        let actor = performed_by.as_str();
        let this = self;
        self.agents
            .run(kind, actor, move || async move {
                if kind.generates_plans() {
                    this.agent_plan(kind, actor).await
                } else {
                    this.agent_report(kind).await
                }
            })
            .await
    }

    async fn agent_plan(&self, kind: AgentKind, actor: &str) -> Result<AgentOutcome, FopError> {
        let opportunities = self.list_opportunities(EnvFilter::All, RiskFilter::All).await?;
        let request = PlanRequest::new(actor).automatic();
        let plan = self.generator.generate(&opportunities, &request).await?;

        let mut details = AuditDetails::new();
        details.insert("agent".to_string(), json!(kind.as_str()));
        details.insert("auto_generated".to_string(), json!(true));
        details.insert("origin".to_string(), json!(PlanOrigin::Automatic));
        self.lifecycle.record_generated(&plan, actor, details)?;

        Ok(AgentOutcome::PlanGenerated {
            plan_id: plan.plan_id.to_string(),
            est_total_savings_usd_month: plan.est_total_savings_usd_month,
            opportunities_scanned: opportunities.len(),
        })
    }

    async fn agent_report(&self, kind: AgentKind) -> Result<AgentOutcome, FopError> {
        let message = match kind {
            AgentKind::ExecutionMonitor => {
                let executed = self
                    .list_plans()
                    .await?
                    .iter()
                    .filter(|p| p.status == PlanStatus::Executed)
                    .count();
                format!("Execution monitoring completed - {executed} executed plans, all systems nominal")
            }
            _ => "Assistant runs interactively; nothing scheduled".to_string(),
        };
        Ok(AgentOutcome::Idle { message })
    }

    /// Dashboard figures
    ///
    /// # Errors
    /// - upstream errors from the source or store
    pub async fn summary(&self) -> Result<PlannerSummary, FopError> {
        let opportunities = self.list_opportunities(EnvFilter::All, RiskFilter::All).await?;
        let plans = self.list_plans().await?;

        let scores: Vec<f64> = opportunities
            .iter()
            .filter_map(|o| o.confidence_score.map(f64::from))
            .collect();
        let average_confidence = (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);

        let mut plans_by_status: BTreeMap<String, usize> = [
            PlanStatus::Planned,
            PlanStatus::Approved,
            PlanStatus::Executed,
            PlanStatus::RolledBack,
        ]
        .into_iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
        for plan in &plans {
            *plans_by_status.entry(plan.status.as_str().to_string()).or_default() += 1;
        }

        Ok(PlannerSummary {
            opportunity_count: opportunities.len(),
            total_potential_savings_usd_month: opportunities.iter().map(|o| o.est_savings_usd_month).sum(),
            average_confidence,
            active_agents: self.agents.active_count(),
            plans_by_status,
            audit_entries: self.ledger.len(),
        })
    }
}

impl std::fmt::Debug for FinOpsPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinOpsPlanner")
            .field("config", &self.config)
            .field("generator", &self.generator)
            .field("lifecycle", &self.lifecycle)
            .field("agents", &self.agents)
            .finish_non_exhaustive()
    }
}
