//! Error types for the FOP model
//!
//! Raised when an externally supplied record breaks a data-model invariant.

/// Data model validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// Required text field is blank
    #[error("{record} field '{field}' must not be empty")]
    EmptyField {
        /// Record kind (e.g. "opportunity")
        record: &'static str,
        /// Offending field name
        field: &'static str,
    },

    /// Savings estimate is negative or not a finite number
    #[error("opportunity {id}: est_savings_usd_month must be a finite amount >= 0, got {value}")]
    InvalidSavings {
        /// Opportunity id
        id: String,
        /// Rejected value
        value: f64,
    },

    /// Confidence score outside 0..=100
    #[error("opportunity {id}: confidence_score must be within 0..=100, got {value}")]
    InvalidConfidence {
        /// Opportunity id
        id: String,
        /// Rejected value
        value: u32,
    },

    /// Unknown enum literal
    #[error("unknown {kind} '{value}'")]
    UnknownVariant {
        /// Enum kind (e.g. "environment")
        kind: &'static str,
        /// Rejected literal
        value: String,
    },

    /// Plan fields disagree with its status
    #[error("plan {plan_id} is inconsistent: {reason}")]
    InconsistentPlan {
        /// Plan id
        plan_id: String,
        /// What is wrong
        reason: String,
    },
}

impl ModelError {
    /// Create empty-field error
    #[inline]
    #[must_use]
    pub fn empty(record: &'static str, field: &'static str) -> Self {
        Self::EmptyField { record, field }
    }

    /// Create unknown-variant error
    #[inline]
    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}
