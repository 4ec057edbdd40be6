//! Error types for FOP Core
//!
//! One top-level error, `FopError`, with a variant per failure class:
//! - Validation of caller input (including an empty selection)
//! - Guardrail violations and illegal transitions (policy failures)
//! - Agent run-state conflicts
//! - Upstream failures and timeouts (the only retryable class)
//! - Unknown plan or agent ids

use crate::config::ConfigError;
use fop_guardrails::GuardrailViolation;
use fop_ledger::LedgerError;
use fop_model::{EnvFilter, ModelError, PlanStatus, RiskFilter};
use std::future::Future;
use std::time::Duration;

/// Main FOP error type
#[derive(Debug, thiserror::Error)]
pub enum FopError {
    /// Malformed caller input
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A mandatory guardrail failed
    #[error(transparent)]
    Guardrail(#[from] GuardrailViolation),

    /// State machine precondition not met (including lost races)
    #[error("invalid transition for plan {plan_id}: {from} -> {to}")]
    InvalidTransition {
        /// Plan id
        plan_id: String,
        /// Status the plan was found in
        from: PlanStatus,
        /// Requested status
        to: PlanStatus,
    },

    /// Agent is switched off
    #[error("agent {0} is disabled")]
    AgentDisabled(String),

    /// Agent already has a run in flight
    #[error("agent {0} is already running")]
    AlreadyRunning(String),

    /// Recommendation generator failed or returned an unusable body
    #[error("recommendation generation failed: {0}")]
    RecommendationGenerationFailed(String),

    /// External call did not answer in time
    #[error("{operation} timed out after {timeout_ms}ms")]
    UpstreamTimeout {
        /// Operation that timed out
        operation: String,
        /// Limit that was exceeded
        timeout_ms: u64,
    },

    /// External dependency failed
    #[error("{operation} failed: {message}")]
    UpstreamFailure {
        /// Operation that failed
        operation: String,
        /// Cause reported by the dependency
        message: String,
    },

    /// Unknown plan or agent
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind ("plan", "agent")
        kind: &'static str,
        /// Requested id
        id: String,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Audit ledger rejected a write
    #[error("audit ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl FopError {
    /// Check if the caller may retry with backoff
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamTimeout { .. } | Self::UpstreamFailure { .. })
    }

    /// Check if the error encodes safety policy (never retried or downgraded)
    #[inline]
    #[must_use]
    pub fn is_policy_failure(&self) -> bool {
        matches!(self, Self::Guardrail(_) | Self::InvalidTransition { .. })
    }

    /// Stable machine-readable classification
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(ValidationError::NoOpportunitiesAvailable { .. }) => "NO_OPPORTUNITIES_AVAILABLE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Guardrail(_) => "GUARDRAIL_VIOLATION",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::AgentDisabled(_) => "AGENT_DISABLED",
            Self::AlreadyRunning(_) => "ALREADY_RUNNING",
            Self::RecommendationGenerationFailed(_) => "RECOMMENDATION_GENERATION_FAILED",
            Self::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
            Self::UpstreamFailure { .. } => "UPSTREAM_FAILURE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Ledger(_) => "LEDGER_ERROR",
        }
    }

    /// Create not-found error for a plan
    #[inline]
    pub fn plan_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "plan",
            id: id.into(),
        }
    }

    /// Create upstream failure
    #[inline]
    pub fn upstream(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamFailure {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Caller input errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Nothing left to plan after filtering
    #[error("no opportunities available for env={env} risk={risk}")]
    NoOpportunitiesAvailable {
        /// Environment filter used
        env: EnvFilter,
        /// Risk filter used
        risk: RiskFilter,
    },

    /// Required identity or text is blank
    #[error("'{0}' must not be empty")]
    EmptyField(&'static str),

    /// Caller-supplied plan id already exists
    #[error("plan id {0} is already in use")]
    DuplicatePlanId(String),

    /// Opportunity record breaks the data model
    #[error(transparent)]
    InvalidRecord(#[from] ModelError),

    /// Input could not be decoded
    #[error("malformed input: {0}")]
    Malformed(String),
}

/// Failure reported by an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// Dependency could not be reached or errored
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Dependency refused the request
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Reject a blank identity or required text
pub(crate) fn require(field: &'static str, value: &str) -> Result<(), FopError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field).into());
    }
    Ok(())
}

/// Run an upstream call under a deadline
///
/// # Errors
/// - `FopError::UpstreamTimeout` when `limit` elapses first
/// - the call's own error, converted
pub(crate) async fn with_timeout<T, E, F>(operation: &str, limit: Duration, call: F) -> Result<T, FopError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<FopError>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => {
            let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(operation, timeout_ms, "upstream call timed out");
            Err(FopError::UpstreamTimeout {
                operation: operation.to_string(),
                timeout_ms,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fop_model::GuardrailId;

    #[test]
    fn fop_error_display() {
        let err = FopError::InvalidTransition {
            plan_id: "plan-1".to_string(),
            from: PlanStatus::Planned,
            to: PlanStatus::Executed,
        };
        assert_eq!(err.to_string(), "invalid transition for plan plan-1: PLANNED -> EXECUTED");
    }

    #[test]
    fn classification() {
        let guardrail: FopError = GuardrailViolation::new(GuardrailId::EnvScope, "prod").into();
        assert!(guardrail.is_policy_failure());
        assert!(!guardrail.is_retryable());
        assert_eq!(guardrail.kind(), "GUARDRAIL_VIOLATION");

        let timeout = FopError::UpstreamTimeout {
            operation: "recommendation".to_string(),
            timeout_ms: 10,
        };
        assert!(timeout.is_retryable());
        assert!(!timeout.is_policy_failure());

        let empty: FopError = ValidationError::NoOpportunitiesAvailable {
            env: EnvFilter::All,
            risk: RiskFilter::All,
        }
        .into();
        assert_eq!(empty.kind(), "NO_OPPORTUNITIES_AVAILABLE");
    }

    #[tokio::test]
    async fn with_timeout_reports_the_limit() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, FopError>(())
        };
        let err = with_timeout("storage", Duration::from_millis(5), slow).await.unwrap_err();
        assert!(matches!(err, FopError::UpstreamTimeout { timeout_ms: 5, .. }));
    }

    #[test]
    fn blank_identity_rejected() {
        assert!(require("actor", "  ").is_err());
        assert!(require("actor", "ops").is_ok());
    }
}
