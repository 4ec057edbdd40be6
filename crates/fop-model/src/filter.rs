//! Environment and risk filters
//!
//! Serialized as `"ALL"` or the variant wire name.

use crate::error::ModelError;
use crate::opportunity::{Environment, Opportunity, RiskLevel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment filter applied before plan selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EnvFilter {
    /// Pass-through
    #[default]
    All,
    /// Single environment
    Only(Environment),
}

impl EnvFilter {
    /// Whether the opportunity passes the filter
    #[inline]
    #[must_use]
    pub fn matches(&self, opportunity: &Opportunity) -> bool {
        match self {
            EnvFilter::All => true,
            EnvFilter::Only(env) => opportunity.env == *env,
        }
    }
}

impl fmt::Display for EnvFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvFilter::All => f.write_str("ALL"),
            EnvFilter::Only(env) => write!(f, "{env}"),
        }
    }
}

impl FromStr for EnvFilter {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("ALL") {
            return Ok(EnvFilter::All);
        }
        s.parse().map(EnvFilter::Only)
    }
}

impl TryFrom<String> for EnvFilter {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EnvFilter> for String {
    fn from(value: EnvFilter) -> Self {
        value.to_string()
    }
}

/// Risk filter applied before plan selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RiskFilter {
    /// Pass-through
    #[default]
    All,
    /// Single risk level
    Only(RiskLevel),
}

impl RiskFilter {
    /// Whether the opportunity passes the filter
    #[inline]
    #[must_use]
    pub fn matches(&self, opportunity: &Opportunity) -> bool {
        match self {
            RiskFilter::All => true,
            RiskFilter::Only(risk) => opportunity.risk == *risk,
        }
    }
}

impl fmt::Display for RiskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskFilter::All => f.write_str("ALL"),
            RiskFilter::Only(risk) => write!(f, "{risk}"),
        }
    }
}

impl FromStr for RiskFilter {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("ALL") {
            return Ok(RiskFilter::All);
        }
        s.parse().map(RiskFilter::Only)
    }
}

impl TryFrom<String> for RiskFilter {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RiskFilter> for String {
    fn from(value: RiskFilter) -> Self {
        value.to_string()
    }
}
