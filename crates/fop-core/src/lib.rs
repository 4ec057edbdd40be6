//! FOP Core - FinOps plan generation and lifecycle engine
//!
//! Turns discovered cost-saving opportunities into guardrail-checked action
//! plans and drives them through an audited lifecycle:
//!
//! ```text
//! OpportunitySource -> PlanGenerator -> GuardrailPolicy -> PlanRepository
//!                                                              |
//!                       AuditLedger <- LifecycleController <---+
//! ```
//!
//! A small fixed set of background agents can draft plans on their own;
//! at most one run per agent is ever in flight.
//!
//! # Example
//!
//! ```rust,ignore
//! use fop_core::prelude::*;
//!
//! let planner = FinOpsPlanner::builder(PlannerConfig::default())
//!     .with_source(Arc::new(InMemoryOpportunitySource::from_json_file("opps.json")?))
//!     .build()?;
//!
//! let plan = planner.generate_plan(PlanRequest::new("ops@example.com")).await?;
//! planner.approve(&plan.plan_id, "lead@example.com").await?;
//! planner.execute(&plan.plan_id, "lead@example.com").await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod config;
pub mod error;
pub mod generator;
pub mod lifecycle;
pub mod orchestrator;
pub mod planner;
pub mod recommender;
pub mod source;
pub mod store;

// Re-exports for convenience
pub use config::{AgentSettings, ConfigError, PlannerConfig, TimeoutConfig};
pub use error::{FopError, UpstreamError, ValidationError};
pub use generator::{plan_environment, select_opportunities, PlanGenerator, PlanRequest};
pub use lifecycle::{allowed_transitions, validate_transition, LifecycleController, DEFAULT_ROLLBACK_REASON};
pub use orchestrator::{AgentDescriptor, AgentKind, AgentOrchestrator, AgentOutcome, AgentRunReport, AgentStatus};
pub use planner::{FinOpsPlanner, PlannerBuilder, PlannerSummary, SYSTEM_IDENTITY};
pub use recommender::{PlanOrigin, Recommendation, RecommendationGenerator, RecommendationRequest, TemplateRecommender};
pub use source::{IdentityProvider, InMemoryOpportunitySource, OpportunitySource, StaticIdentity};
pub use store::{AuditSink, InMemoryPlanRepository, PlanRepository, StoreError};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the planner
    pub use crate::{
        AgentKind, FinOpsPlanner, FopError, InMemoryOpportunitySource, PlanRequest, PlannerConfig,
    };
    pub use fop_ledger::{AuditAction, AuditQuery, SortOrder};
    pub use fop_model::prelude::*;
    pub use std::sync::Arc;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
