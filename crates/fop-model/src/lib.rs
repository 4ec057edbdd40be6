//! FOP Model - typed records shared by every FinOps Planner crate
//!
//! Defines:
//! - Opportunities (read-only findings produced by external discovery)
//! - Action plans and their lifecycle status
//! - Guardrail identifiers attached to plans for audit
//! - Simulated execution records
//!
//! # Example
//!
//! ```rust,ignore
//! use fop_model::prelude::*;
//!
//! let opportunity: Opportunity = serde_json::from_str(raw)?;
//! opportunity.validate()?;
//!
//! if EnvFilter::All.matches(&opportunity) && opportunity.env.is_mutable() {
//!     println!("{} saves ${}/mo", opportunity.resource, opportunity.est_savings_usd_month);
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod error;
pub mod execution;
pub mod filter;
pub mod guardrail;
pub mod ids;
pub mod opportunity;
pub mod plan;

// Re-exports for convenience
pub use error::ModelError;
pub use execution::{ExecutionDetails, ExecutionSettings, ExecutionTarget, ScheduleRule, SimulatedAction};
pub use filter::{EnvFilter, RiskFilter};
pub use guardrail::GuardrailId;
pub use ids::PlanId;
pub use opportunity::{Environment, Opportunity, OpportunityType, RiskLevel, Service};
pub use plan::{ActionPlan, PlanStatus};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the FOP model
    pub use crate::{
        ActionPlan, EnvFilter, Environment, ExecutionDetails, GuardrailId, ModelError,
        Opportunity, OpportunityType, PlanId, PlanStatus, RiskFilter, RiskLevel, Service,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hard upper bound on resources a single plan may touch
pub const MAX_BLAST_RADIUS: usize = 5;

/// Maintenance window used when none is configured
pub const DEFAULT_MAINTENANCE_WINDOW: &str = "19:00-07:00";
