//! Plan identifiers
//!
//! Interactive plans use `plan-YYYY-MM-DD-xxxxxx`, agent plans use
//! `plan-auto-<unix-millis>-xxxxxx`. The suffix comes from the random part
//! of a ULID so two plans created in the same millisecond still differ.

use crate::error::ModelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Externally visible, unique plan identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlanId(String);

impl PlanId {
    /// Wrap a caller-supplied identifier
    ///
    /// # Errors
    /// - `ModelError::EmptyField` if the id is blank
    pub fn new(id: impl Into<String>) -> Result<Self, ModelError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ModelError::empty("plan", "plan_id"));
        }
        Ok(Self(id))
    }

    /// Identifier for a plan generated by a person
    #[must_use]
    pub fn interactive(now: DateTime<Utc>) -> Self {
        Self(format!("plan-{}-{}", now.format("%Y-%m-%d"), random_suffix()))
    }

    /// Identifier for a plan generated by a background agent
    #[must_use]
    pub fn automatic(now: DateTime<Utc>) -> Self {
        Self(format!("plan-auto-{}-{}", now.timestamp_millis(), random_suffix()))
    }

    /// Borrow the raw identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn random_suffix() -> String {
    let encoded = Ulid::new().to_string().to_lowercase();
    encoded[encoded.len() - 6..].to_string()
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PlanId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PlanId> for String {
    fn from(value: PlanId) -> Self {
        value.0
    }
}

impl AsRef<str> for PlanId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
