//! Simulated execution records
//!
//! Execution never reaches a cloud API. The record describes the scheduled
//! rule that *would* be created and what it would do to each resource.

use crate::opportunity::{Opportunity, OpportunityType, Service};
use crate::DEFAULT_MAINTENANCE_WINDOW;
use serde::{Deserialize, Serialize};

/// Action a target resource would receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedAction {
    /// Scheduled stop outside the window
    Stop,
    /// Resize / reconfigure
    Modify,
    /// Snapshot then delete
    SnapshotAndDelete,
    /// Storage class transition
    TransitionStorage,
}

impl SimulatedAction {
    /// Derive the action from the opportunity kind
    #[must_use]
    pub fn for_kind(kind: OpportunityType) -> Self {
        match kind {
            OpportunityType::Ec2Offhours | OpportunityType::RdsOffhours => SimulatedAction::Stop,
            OpportunityType::Ec2Rightsize => SimulatedAction::Modify,
            OpportunityType::EbsUnused => SimulatedAction::SnapshotAndDelete,
            OpportunityType::S3Lifecycle => SimulatedAction::TransitionStorage,
        }
    }
}

/// One resource touched by the simulated rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTarget {
    /// Resource identifier
    pub resource: String,
    /// Action the rule would take
    pub action: SimulatedAction,
    /// Owning service
    pub service: Service,
}

/// Scheduled rule the execution would install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRule {
    /// Rule name, `<prefix>-<plan_id>`
    pub name: String,
    /// Schedule expression
    pub schedule: String,
    /// Affected resources
    pub targets: Vec<ExecutionTarget>,
}

/// Settings that shape the simulated record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Rule name prefix
    pub rule_prefix: String,
    /// Schedule expression
    pub schedule: String,
    /// Declared execution window
    pub window_label: String,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            rule_prefix: "finops-offhours".to_string(),
            schedule: "cron(0 19 ? * MON-FRI *)".to_string(),
            window_label: format!("{DEFAULT_MAINTENANCE_WINDOW} UTC"),
        }
    }
}

/// Record of a simulated plan execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionDetails {
    /// Always true: nothing external is mutated
    pub simulated: bool,
    /// Rule that would be installed
    pub schedule_rule: ScheduleRule,
    /// Number of resources touched
    pub resources_affected: usize,
    /// Declared execution window
    pub execution_window: String,
}

impl ExecutionDetails {
    /// Build the simulation record for a plan's opportunities
    #[must_use]
    pub fn simulate(plan_id: &str, opportunities: &[Opportunity], settings: &ExecutionSettings) -> Self {
        let targets: Vec<ExecutionTarget> = opportunities
            .iter()
            .map(|opp| ExecutionTarget {
                resource: opp.resource.clone(),
                action: SimulatedAction::for_kind(opp.kind),
                service: opp.service,
            })
            .collect();

        Self {
            simulated: true,
            resources_affected: targets.len(),
            schedule_rule: ScheduleRule {
                name: format!("{}-{}", settings.rule_prefix, plan_id),
                schedule: settings.schedule.clone(),
                targets,
            },
            execution_window: settings.window_label.clone(),
        }
    }
}
