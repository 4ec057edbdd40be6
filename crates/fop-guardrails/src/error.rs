//! Guardrail violation error

use fop_model::GuardrailId;

/// A mandatory guardrail failed
///
/// Never downgraded or retried: it encodes safety policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("guardrail {guardrail} violated: {reason}")]
pub struct GuardrailViolation {
    /// Rule that failed
    pub guardrail: GuardrailId,
    /// Human-readable cause
    pub reason: String,
}

impl GuardrailViolation {
    /// Create a violation
    #[inline]
    pub fn new(guardrail: GuardrailId, reason: impl Into<String>) -> Self {
        Self {
            guardrail,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_display_names_the_rule() {
        let err = GuardrailViolation::new(GuardrailId::EnvScope, "plan env is PROD");
        assert_eq!(err.to_string(), "guardrail ENV_SCOPE violated: plan env is PROD");
    }
}
