//! Guardrail identifiers
//!
//! The evaluator lives in `fop-guardrails`; the identifiers live here because
//! plans record which guardrails passed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mandatory safety predicate, in canonical evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardrailId {
    /// Plan and every opportunity are in DEV or TEST
    EnvScope,
    /// At most five resources per plan
    BlastRadius,
    /// At least one rollback step
    RollbackPresent,
    /// A maintenance window is referenced
    WindowDefined,
}

impl GuardrailId {
    /// All guardrails in evaluation order
    pub const ALL: [GuardrailId; 4] = [
        GuardrailId::EnvScope,
        GuardrailId::BlastRadius,
        GuardrailId::RollbackPresent,
        GuardrailId::WindowDefined,
    ];

    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardrailId::EnvScope => "ENV_SCOPE",
            GuardrailId::BlastRadius => "BLAST_RADIUS",
            GuardrailId::RollbackPresent => "ROLLBACK_PRESENT",
            GuardrailId::WindowDefined => "WINDOW_DEFINED",
        }
    }
}

impl fmt::Display for GuardrailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
