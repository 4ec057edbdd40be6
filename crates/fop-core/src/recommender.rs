//! Recommendation generator boundary
//!
//! The generator is an untrusted black box that answers with arbitrary JSON.
//! Its answer is parsed strictly into [`Recommendation`]; anything missing a
//! required field is rejected outright, never patched up.

use crate::error::UpstreamError;
use async_trait::async_trait;
use fop_model::{Environment, Opportunity, SimulatedAction, MAX_BLAST_RADIUS};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Who asked for the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOrigin {
    /// A person, through the facade or CLI
    Interactive,
    /// A background agent
    Automatic,
}

/// Structured input handed to the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    /// Plan environment
    pub env: Environment,
    /// Selected opportunities, highest savings first
    pub opportunities: Vec<Opportunity>,
    /// Locally computed total
    pub est_total_savings_usd_month: f64,
    /// Window the plan will declare
    pub maintenance_window: String,
    /// Requesting side
    pub origin: PlanOrigin,
}

/// Parsed generator answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Plan objective
    pub objective: String,
    /// Ordered steps to apply
    #[serde(alias = "steps")]
    pub recommended_steps: Vec<String>,
    /// Ordered steps to undo; may be empty, the guardrail decides
    #[serde(alias = "rollback")]
    pub rollback_plan: Vec<String>,
    /// Free-text guardrail notes (advisory)
    #[serde(default, alias = "guardrails_hint")]
    pub guardrails_checked: Vec<String>,
    /// Generator's own total (advisory)
    #[serde(default)]
    pub est_total_savings_usd_month: Option<f64>,
}

impl Recommendation {
    /// Parse a raw generator answer
    ///
    /// # Errors
    /// Description of the first missing or malformed field
    pub fn from_response(value: serde_json::Value) -> Result<Self, String> {
        let recommendation: Self = serde_json::from_value(value).map_err(|e| e.to_string())?;
        if recommendation.objective.trim().is_empty() {
            return Err("objective is empty".to_string());
        }
        if recommendation.recommended_steps.iter().all(|s| s.trim().is_empty()) {
            return Err("recommended_steps is empty".to_string());
        }
        Ok(recommendation)
    }
}

/// External producer of plan prose
#[async_trait]
pub trait RecommendationGenerator: Send + Sync {
    /// Produce a candidate plan body for the selected opportunities
    async fn generate(&self, request: &RecommendationRequest) -> Result<serde_json::Value, UpstreamError>;
}

/// Offline generator built from fixed plan templates
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRecommender;

impl TemplateRecommender {
    fn step_for(opportunity: &Opportunity) -> String {
        let verb = match SimulatedAction::for_kind(opportunity.kind) {
            SimulatedAction::Stop => "Schedule off-hours stop for",
            SimulatedAction::Modify => "Rightsize",
            SimulatedAction::SnapshotAndDelete => "Snapshot and delete",
            SimulatedAction::TransitionStorage => "Apply lifecycle transition to",
        };
        format!("{verb} {} ({})", opportunity.resource, opportunity.kind)
    }
}

#[async_trait]
impl RecommendationGenerator for TemplateRecommender {
    async fn generate(&self, request: &RecommendationRequest) -> Result<serde_json::Value, UpstreamError> {
        let count = request.opportunities.len();
        let objective = match request.origin {
            PlanOrigin::Automatic => format!("Automated optimization plan: {count} opportunities identified"),
            PlanOrigin::Interactive => format!(
                "Reduce {} spend by ${:.2}/month across {count} resources",
                request.env, request.est_total_savings_usd_month
            ),
        };

        let mut steps = vec![
            "Review and validate resource metrics".to_string(),
            "Schedule maintenance window".to_string(),
        ];
        steps.extend(request.opportunities.iter().map(Self::step_for));
        steps.push(format!("Execute optimizations during off-hours ({})", request.maintenance_window));
        steps.push("Monitor resource performance post-change".to_string());

        Ok(json!({
            "objective": objective,
            "recommended_steps": steps,
            "rollback_plan": [
                "Restore original instance types from backup",
                "Re-enable 24/7 schedules",
                "Validate application functionality"
            ],
            "guardrails_checked": [
                format!("ENV = {}", request.env),
                format!("Resources <= {MAX_BLAST_RADIUS}"),
                format!("Window: {}", request.maintenance_window),
                "No PROD impact"
            ],
            "est_total_savings_usd_month": request.est_total_savings_usd_month,
        }))
    }
}
