//! Testing utilities for the FOP workspace
//!
//! Shared fixtures, recommender doubles and planner setup.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::Utc;
use fop_core::{
    AuditSink, FinOpsPlanner, InMemoryOpportunitySource, PlannerConfig, RecommendationGenerator,
    RecommendationRequest, StaticIdentity, UpstreamError,
};
use fop_ledger::{AuditLogEntry, LedgerError, NewAuditEntry};
use fop_model::{
    ActionPlan, Environment, GuardrailId, Opportunity, OpportunityType, PlanId, PlanStatus, RiskLevel, Service,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TEST_USER: &str = "ops@example.com";

pub fn opportunity(id: &str, env: Environment, risk: RiskLevel, savings: f64) -> Opportunity {
    Opportunity::new(id, Service::Ec2, OpportunityType::Ec2Offhours, format!("i-{id}"), env, risk, savings)
}

/// The worked example: 120 DEV, 300 TEST, 50 PROD, 90 DEV
pub fn reference_opportunities() -> Vec<Opportunity> {
    vec![
        opportunity("opp-1", Environment::Dev, RiskLevel::Low, 120.0).with_confidence(90),
        opportunity("opp-2", Environment::Test, RiskLevel::Medium, 300.0).with_confidence(80),
        opportunity("opp-3", Environment::Prod, RiskLevel::Low, 50.0),
        opportunity("opp-4", Environment::Dev, RiskLevel::High, 90.0).with_confidence(70),
    ]
}

pub fn planned_plan(id: &str) -> ActionPlan {
    let opportunities = vec![opportunity("p1", Environment::Dev, RiskLevel::Low, 100.0)];
    ActionPlan {
        plan_id: PlanId::new(id).unwrap(),
        objective: "Stop idle dev instances".to_string(),
        env: Environment::Dev,
        est_total_savings_usd_month: 100.0,
        top_opportunities: opportunities,
        recommended_steps: vec!["Schedule stop".to_string()],
        guardrails_checked: GuardrailId::ALL.to_vec(),
        rollback_plan: vec!["Re-enable 24/7 schedule".to_string()],
        maintenance_window: "19:00-07:00".to_string(),
        reported_total_usd_month: None,
        status: PlanStatus::Planned,
        version: 0,
        created_at: Utc::now(),
        created_by: TEST_USER.to_string(),
        approved_by: None,
        approved_at: None,
        executed_at: None,
        execution_details: None,
        rolled_back_at: None,
        rollback_reason: None,
    }
}

/// Config with short upstream deadlines
pub fn test_config() -> PlannerConfig {
    PlannerConfig::default()
        .with_recommendation_timeout(Duration::from_millis(200))
        .with_storage_timeout(Duration::from_millis(200))
}

/// Answers every request with the same body
#[derive(Debug)]
pub struct ScriptedRecommender {
    response: serde_json::Value,
    calls: AtomicUsize,
}

impl ScriptedRecommender {
    pub fn new(response: serde_json::Value) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecommendationGenerator for ScriptedRecommender {
    async fn generate(&self, _request: &RecommendationRequest) -> Result<serde_json::Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Always fails
#[derive(Debug, Clone)]
pub struct FailingRecommender(pub UpstreamError);

#[async_trait]
impl RecommendationGenerator for FailingRecommender {
    async fn generate(&self, _request: &RecommendationRequest) -> Result<serde_json::Value, UpstreamError> {
        Err(self.0.clone())
    }
}

/// Sleeps before answering
#[derive(Debug, Clone)]
pub struct SlowRecommender(pub Duration);

#[async_trait]
impl RecommendationGenerator for SlowRecommender {
    async fn generate(&self, request: &RecommendationRequest) -> Result<serde_json::Value, UpstreamError> {
        tokio::time::sleep(self.0).await;
        fop_core::TemplateRecommender.generate(request).await
    }
}

/// Rejects every append
#[derive(Debug, Default)]
pub struct FailingAuditSink {
    attempts: AtomicUsize,
}

impl FailingAuditSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl AuditSink for FailingAuditSink {
    fn append(&self, _entry: NewAuditEntry) -> Result<Arc<AuditLogEntry>, LedgerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(LedgerError::InvalidEntry("ledger offline".to_string()))
    }
}

pub fn setup_test_planner(opportunities: Vec<Opportunity>) -> FinOpsPlanner {
    setup_planner_with(opportunities, Arc::new(fop_core::TemplateRecommender))
}

pub fn setup_planner_with(
    opportunities: Vec<Opportunity>,
    recommender: Arc<dyn RecommendationGenerator>,
) -> FinOpsPlanner {
    FinOpsPlanner::builder(test_config())
        .with_source(Arc::new(InMemoryOpportunitySource::new(opportunities).unwrap()))
        .with_recommender(recommender)
        .with_identity(Arc::new(StaticIdentity::new(TEST_USER)))
        .build()
        .unwrap()
}
