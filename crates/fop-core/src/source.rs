//! Opportunity store adapter and identity boundary
//!
//! Opportunities are read-only input. The adapter keeps insertion order and
//! applies both filters; it never sorts or mutates records.

use crate::error::{FopError, UpstreamError, ValidationError};
use async_trait::async_trait;
use fop_model::{EnvFilter, Opportunity, RiskFilter};
use std::path::Path;

/// Read-only view over discovered opportunities
#[async_trait]
pub trait OpportunitySource: Send + Sync {
    /// Records passing both filters, in insertion order
    async fn list_opportunities(&self, env: EnvFilter, risk: RiskFilter) -> Result<Vec<Opportunity>, UpstreamError>;
}

/// Opportunity source over a fixed, validated record set
#[derive(Debug, Clone, Default)]
pub struct InMemoryOpportunitySource {
    records: Vec<Opportunity>,
}

impl InMemoryOpportunitySource {
    /// Create source from records
    ///
    /// # Errors
    /// - `ValidationError::InvalidRecord` for the first record that fails validation
    pub fn new(records: Vec<Opportunity>) -> Result<Self, FopError> {
        for record in &records {
            record.validate().map_err(ValidationError::from)?;
        }
        Ok(Self { records })
    }

    /// Load a JSON array of opportunity records
    ///
    /// # Errors
    /// - `ValidationError::Malformed` if the document does not decode
    /// - `ValidationError::InvalidRecord` if a record fails validation
    pub fn from_json_str(raw: &str) -> Result<Self, FopError> {
        let records: Vec<Opportunity> =
            serde_json::from_str(raw).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        Self::new(records)
    }

    /// Load a JSON file of opportunity records
    ///
    /// # Errors
    /// - `FopError::UpstreamFailure` if the file cannot be read
    /// - see [`InMemoryOpportunitySource::from_json_str`]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FopError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FopError::upstream(format!("read {}", path.display()), e.to_string()))?;
        Self::from_json_str(&raw)
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the source holds no records
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl OpportunitySource for InMemoryOpportunitySource {
    async fn list_opportunities(&self, env: EnvFilter, risk: RiskFilter) -> Result<Vec<Opportunity>, UpstreamError> {
        Ok(self
            .records
            .iter()
            .filter(|o| env.matches(o) && risk.matches(o))
            .cloned()
            .collect())
    }
}

/// Source of the verified identity acting on the planner
pub trait IdentityProvider: Send + Sync {
    /// Current user, if authenticated
    fn current_user(&self) -> Option<String>;
}

/// Identity fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentity(String);

impl StaticIdentity {
    /// Create identity
    #[inline]
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self(user.into())
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<String> {
        Some(self.0.clone()).filter(|u| !u.trim().is_empty())
    }
}
