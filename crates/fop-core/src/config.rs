//! Planner configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration. Validation runs before any component is built.

use crate::orchestrator::AgentKind;
use fop_guardrails::{references_window, GuardrailPolicy};
use fop_model::{ExecutionSettings, DEFAULT_MAINTENANCE_WINDOW, MAX_BLAST_RADIUS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {message}")]
    Io {
        /// File path
        path: String,
        /// OS error text
        message: String,
    },

    /// Document is not valid TOML for this schema
    #[error("cannot parse configuration: {0}")]
    Parse(String),

    /// Value out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Upstream call deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Recommendation generator deadline
    pub recommendation_ms: u64,
    /// Plan store and opportunity source deadline
    pub storage_ms: u64,
}

impl TimeoutConfig {
    /// Recommendation deadline
    #[inline]
    #[must_use]
    pub fn recommendation(&self) -> Duration {
        Duration::from_millis(self.recommendation_ms)
    }

    /// Storage deadline
    #[inline]
    #[must_use]
    pub fn storage(&self) -> Duration {
        Duration::from_millis(self.storage_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            recommendation_ms: 30_000,
            storage_ms: 5_000,
        }
    }
}

/// Per-agent overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentSettings {
    /// Human-readable schedule; the reference schedule when absent
    pub schedule: Option<String>,
    /// Initial enabled flag
    pub enabled: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            schedule: None,
            enabled: true,
        }
    }
}

/// Planner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerConfig {
    /// Blast radius; may only tighten the hard limit of 5
    pub max_resources: usize,
    /// Maintenance window stamped on generated plans
    pub maintenance_window: String,
    /// Window label recorded on simulated executions
    pub execution_window_label: String,
    /// Schedule expression of the simulated rule
    pub execution_schedule: String,
    /// Name prefix of the simulated rule
    pub schedule_rule_prefix: String,
    /// Allowed gap between generator-reported and computed totals
    pub savings_tolerance_usd: f64,
    /// Upstream deadlines
    pub timeouts: TimeoutConfig,
    /// Per-agent overrides keyed by agent id
    pub agents: BTreeMap<String, AgentSettings>,
}

impl PlannerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// - `ConfigError::Parse` for malformed TOML or unknown keys
    /// - `ConfigError::Invalid` for out-of-range values
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - see [`PlannerConfig::from_toml_str`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    /// With blast radius
    #[inline]
    #[must_use]
    pub fn with_max_resources(mut self, max: usize) -> Self {
        self.max_resources = max;
        self
    }

    /// With maintenance window
    #[inline]
    #[must_use]
    pub fn with_maintenance_window(mut self, window: impl Into<String>) -> Self {
        self.maintenance_window = window.into();
        self
    }

    /// With recommendation deadline
    #[inline]
    #[must_use]
    pub fn with_recommendation_timeout(mut self, limit: Duration) -> Self {
        self.timeouts.recommendation_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With storage deadline
    #[inline]
    #[must_use]
    pub fn with_storage_timeout(mut self, limit: Duration) -> Self {
        self.timeouts.storage_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With an agent override
    #[inline]
    #[must_use]
    pub fn with_agent(mut self, agent: AgentKind, settings: AgentSettings) -> Self {
        self.agents.insert(agent.as_str().to_string(), settings);
        self
    }

    /// Check value ranges
    ///
    /// # Errors
    /// - `ConfigError::Invalid` naming the first offending key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_BLAST_RADIUS).contains(&self.max_resources) {
            return Err(ConfigError::Invalid(format!(
                "max_resources must be within 1..={MAX_BLAST_RADIUS}, got {}",
                self.max_resources
            )));
        }
        if !self.maintenance_window.trim().is_empty() && !references_window(&self.maintenance_window) {
            return Err(ConfigError::Invalid(format!(
                "maintenance_window '{}' is not an HH:MM-HH:MM range",
                self.maintenance_window
            )));
        }
        if !self.savings_tolerance_usd.is_finite() || self.savings_tolerance_usd < 0.0 {
            return Err(ConfigError::Invalid("savings_tolerance_usd must be >= 0".to_string()));
        }
        if self.timeouts.recommendation_ms == 0 || self.timeouts.storage_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".to_string()));
        }
        if self.schedule_rule_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("schedule_rule_prefix must not be empty".to_string()));
        }
        for id in self.agents.keys() {
            AgentKind::from_str(id).map_err(|_| ConfigError::Invalid(format!("unknown agent '{id}'")))?;
        }
        Ok(())
    }

    /// Guardrail policy for this configuration
    #[must_use]
    pub fn policy(&self) -> GuardrailPolicy {
        GuardrailPolicy::new().with_max_resources(self.max_resources)
    }

    /// Settings for simulated execution records
    #[must_use]
    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            rule_prefix: self.schedule_rule_prefix.clone(),
            schedule: self.execution_schedule.clone(),
            window_label: self.execution_window_label.clone(),
        }
    }

    /// Effective settings for one agent
    #[must_use]
    pub fn agent(&self, agent: AgentKind) -> AgentSettings {
        self.agents.get(agent.as_str()).cloned().unwrap_or_default()
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        let execution = ExecutionSettings::default();
        Self {
            max_resources: MAX_BLAST_RADIUS,
            maintenance_window: DEFAULT_MAINTENANCE_WINDOW.to_string(),
            execution_window_label: execution.window_label,
            execution_schedule: execution.schedule,
            schedule_rule_prefix: execution.rule_prefix,
            savings_tolerance_usd: 0.01,
            timeouts: TimeoutConfig::default(),
            agents: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_reference_values() {
        let config = PlannerConfig::default();
        assert_eq!(config.max_resources, 5);
        assert_eq!(config.maintenance_window, "19:00-07:00");
        assert_eq!(config.execution_window_label, "19:00-07:00 UTC");
        assert_eq!(config.execution_schedule, "cron(0 19 ? * MON-FRI *)");
        assert_eq!(config.timeouts.recommendation(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(PlannerConfig::from_toml_str("").unwrap(), PlannerConfig::default());
    }

    #[test]
    fn parses_overrides() {
        let config = PlannerConfig::from_toml_str(
            r#"
            max_resources = 3
            maintenance_window = "22:00-05:00"

            [timeouts]
            recommendation_ms = 1500

            [agents.plan_optimizer]
            schedule = "Hourly"
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.max_resources, 3);
        assert_eq!(config.timeouts.recommendation_ms, 1500);
        assert_eq!(config.timeouts.storage_ms, 5000);
        let optimizer = config.agent(AgentKind::PlanOptimizer);
        assert!(!optimizer.enabled);
        assert_eq!(optimizer.schedule.as_deref(), Some("Hourly"));
        assert!(config.agent(AgentKind::ExecutionMonitor).enabled);
        assert_eq!(config.policy().max_resources(), 3);
    }

    #[test]
    fn blast_radius_cannot_be_loosened() {
        let err = PlannerConfig::from_toml_str("max_resources = 6").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(PlannerConfig::new().with_max_resources(0).validate().is_err());
    }

    #[test]
    fn rejects_unknown_keys_and_agents() {
        assert!(matches!(
            PlannerConfig::from_toml_str("max_resource = 3"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            PlannerConfig::from_toml_str("[agents.cost_predictor]\nenabled = true"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_window_without_range() {
        let config = PlannerConfig::new().with_maintenance_window("evenings");
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_file_reports_missing_path() {
        let err = PlannerConfig::from_file("/nonexistent/fop.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fop.toml");
        std::fs::write(&path, "savings_tolerance_usd = 0.5\n").unwrap();
        let config = PlannerConfig::from_file(&path).unwrap();
        assert!((config.savings_tolerance_usd - 0.5).abs() < f64::EPSILON);
    }
}
