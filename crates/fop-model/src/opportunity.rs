//! Opportunities: single resource-level cost-saving findings
//!
//! Created by an external discovery process and never mutated here.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cloud service the resource belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Service {
    /// Compute instances
    Ec2,
    /// Block volumes
    Ebs,
    /// Managed databases
    Rds,
    /// Object storage
    S3,
}

impl Service {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Ec2 => "EC2",
            Service::Ebs => "EBS",
            Service::Rds => "RDS",
            Service::S3 => "S3",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of optimisation the finding proposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpportunityType {
    /// Move an instance to a smaller size
    Ec2Rightsize,
    /// Stop an instance outside working hours
    Ec2Offhours,
    /// Remove an unattached volume (after snapshot)
    EbsUnused,
    /// Transition objects to a cheaper storage class
    S3Lifecycle,
    /// Stop a database outside working hours
    RdsOffhours,
}

impl OpportunityType {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityType::Ec2Rightsize => "EC2_RIGHTSIZE",
            OpportunityType::Ec2Offhours => "EC2_OFFHOURS",
            OpportunityType::EbsUnused => "EBS_UNUSED",
            OpportunityType::S3Lifecycle => "S3_LIFECYCLE",
            OpportunityType::RdsOffhours => "RDS_OFFHOURS",
        }
    }

    /// Whether the action is an off-hours schedule
    #[inline]
    #[must_use]
    pub fn is_offhours(&self) -> bool {
        matches!(self, OpportunityType::Ec2Offhours | OpportunityType::RdsOffhours)
    }
}

impl fmt::Display for OpportunityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment environment of a resource or plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Environment {
    /// Development
    Dev,
    /// Test / staging
    Test,
    /// Production (never touched)
    Prod,
}

impl Environment {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "DEV",
            Environment::Test => "TEST",
            Environment::Prod => "PROD",
        }
    }

    /// Whether plans may act on this environment
    #[inline]
    #[must_use]
    pub fn is_mutable(&self) -> bool {
        !matches!(self, Environment::Prod)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEV" => Ok(Environment::Dev),
            "TEST" => Ok(Environment::Test),
            "PROD" => Ok(Environment::Prod),
            _ => Err(ModelError::unknown("environment", s)),
        }
    }
}

/// Risk of applying the change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Low risk
    Low,
    /// Medium risk
    Medium,
    /// High risk
    High,
}

impl RiskLevel {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            _ => Err(ModelError::unknown("risk level", s)),
        }
    }
}

/// A single flagged resource-level cost-saving finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Finding identifier
    pub id: String,
    /// Cloud service
    pub service: Service,
    /// Optimisation kind
    #[serde(rename = "type")]
    pub kind: OpportunityType,
    /// Opaque resource identifier
    pub resource: String,
    /// Environment the resource runs in
    pub env: Environment,
    /// Risk of applying the change
    pub risk: RiskLevel,
    /// Estimated monthly savings in USD
    pub est_savings_usd_month: f64,
    /// Discovery confidence, 0-100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<u32>,
    /// Opaque metrics payload, never interpreted by the planner
    #[serde(default)]
    pub metrics: serde_json::Value,
    /// Owning application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    /// Owning team or person
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Opportunity {
    /// Create an opportunity with empty metrics and no ownership data
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        service: Service,
        kind: OpportunityType,
        resource: impl Into<String>,
        env: Environment,
        risk: RiskLevel,
        est_savings_usd_month: f64,
    ) -> Self {
        Self {
            id: id.into(),
            service,
            kind,
            resource: resource.into(),
            env,
            risk,
            est_savings_usd_month,
            confidence_score: None,
            metrics: serde_json::Value::Null,
            application: None,
            owner: None,
        }
    }

    /// With confidence score
    #[inline]
    #[must_use]
    pub fn with_confidence(mut self, score: u32) -> Self {
        self.confidence_score = Some(score);
        self
    }

    /// With application and owner
    #[inline]
    #[must_use]
    pub fn with_ownership(mut self, application: impl Into<String>, owner: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self.owner = Some(owner.into());
        self
    }

    /// With metrics payload
    #[inline]
    #[must_use]
    pub fn with_metrics(mut self, metrics: serde_json::Value) -> Self {
        self.metrics = metrics;
        self
    }

    /// Check the record invariants
    ///
    /// # Errors
    /// - `ModelError::EmptyField` for a blank id or resource
    /// - `ModelError::InvalidSavings` for negative or non-finite savings
    /// - `ModelError::InvalidConfidence` for a score above 100
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.id.trim().is_empty() {
            return Err(ModelError::empty("opportunity", "id"));
        }
        if self.resource.trim().is_empty() {
            return Err(ModelError::empty("opportunity", "resource"));
        }
        if !self.est_savings_usd_month.is_finite() || self.est_savings_usd_month < 0.0 {
            return Err(ModelError::InvalidSavings {
                id: self.id.clone(),
                value: self.est_savings_usd_month,
            });
        }
        if let Some(score) = self.confidence_score {
            if score > 100 {
                return Err(ModelError::InvalidConfidence {
                    id: self.id.clone(),
                    value: score,
                });
            }
        }
        Ok(())
    }
}
