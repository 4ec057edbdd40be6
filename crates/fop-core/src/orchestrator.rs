//! Agent orchestrator
//!
//! A closed registry of four background agents. Each agent owns two atomic
//! flags:
//! - `enabled`, flipped by [`AgentOrchestrator::toggle`]
//! - `running`, claimed with a single compare-and-swap when a run starts and
//!   released by a drop guard when it ends, whether the work succeeded,
//!   failed or panicked
//!
//! Agents are independent: there is no registry-wide lock.

use crate::config::PlannerConfig;
use crate::error::FopError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// The fixed set of agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Scans opportunities and drafts a plan from them
    OpportunityDiscoverer,
    /// Drafts optimised plans from current opportunities
    PlanOptimizer,
    /// Watches executed plans
    ExecutionMonitor,
    /// Interactive assistant
    FinopsAssistant,
}

impl AgentKind {
    /// All agents in registry order
    pub const ALL: [AgentKind; 4] = [
        AgentKind::OpportunityDiscoverer,
        AgentKind::PlanOptimizer,
        AgentKind::ExecutionMonitor,
        AgentKind::FinopsAssistant,
    ];

    /// Stable id
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::OpportunityDiscoverer => "opportunity_discoverer",
            AgentKind::PlanOptimizer => "plan_optimizer",
            AgentKind::ExecutionMonitor => "execution_monitor",
            AgentKind::FinopsAssistant => "finops_assistant",
        }
    }

    /// Display name
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::OpportunityDiscoverer => "Opportunity Discoverer",
            AgentKind::PlanOptimizer => "Plan Optimizer",
            AgentKind::ExecutionMonitor => "Execution Monitor",
            AgentKind::FinopsAssistant => "FinOps Assistant",
        }
    }

    /// One-line description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            AgentKind::OpportunityDiscoverer => "Scans resources and creates optimization opportunities",
            AgentKind::PlanOptimizer => "Generates optimized action plans from opportunities",
            AgentKind::ExecutionMonitor => "Monitors plan execution and tracks results",
            AgentKind::FinopsAssistant => "Interactive chat assistant for user guidance",
        }
    }

    /// Reference schedule
    #[must_use]
    pub fn default_schedule(&self) -> &'static str {
        match self {
            AgentKind::OpportunityDiscoverer => "Daily at 02:00 UTC",
            AgentKind::PlanOptimizer => "Daily at 03:00 UTC",
            AgentKind::ExecutionMonitor => "Every 4 hours",
            AgentKind::FinopsAssistant => "On-demand",
        }
    }

    /// Whether a run drafts a plan
    #[inline]
    #[must_use]
    pub fn generates_plans(&self) -> bool {
        matches!(self, AgentKind::OpportunityDiscoverer | AgentKind::PlanOptimizer)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = FopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_lowercase();
        AgentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| FopError::NotFound {
                kind: "agent",
                id: s.to_string(),
            })
    }
}

/// Static agent description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Agent id
    pub id: AgentKind,
    /// Display name
    pub name: String,
    /// What the agent does
    pub description: String,
    /// Human-readable schedule
    pub schedule: String,
}

/// What a finished run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AgentOutcome {
    /// A plan was drafted and recorded
    PlanGenerated {
        /// New plan id
        plan_id: String,
        /// Its computed savings
        est_total_savings_usd_month: f64,
        /// Opportunities the agent looked at
        opportunities_scanned: usize,
    },
    /// Nothing to do in this core
    Idle {
        /// Status message
        message: String,
    },
}

/// Record of one completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunReport {
    /// Agent that ran
    pub agent: AgentKind,
    /// Identity the run acted as
    pub performed_by: String,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub finished_at: DateTime<Utc>,
    /// Result
    #[serde(flatten)]
    pub outcome: AgentOutcome,
}

/// Point-in-time view of one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Static description
    #[serde(flatten)]
    pub descriptor: AgentDescriptor,
    /// Enabled flag
    pub enabled: bool,
    /// A run is in flight
    pub running: bool,
    /// Runs that completed successfully
    pub runs_completed: u64,
    /// Runs that failed
    pub runs_failed: u64,
    /// Last successful run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<AgentRunReport>,
}

#[derive(Debug)]
struct AgentSlot {
    descriptor: AgentDescriptor,
    enabled: AtomicBool,
    running: AtomicBool,
    completed: AtomicU64,
    failed: AtomicU64,
    last_run: Mutex<Option<AgentRunReport>>,
}

/// Clears the running flag when the run ends
struct RunGuard(Arc<AgentSlot>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
    }
}

/// Registry of agents and their run state
#[derive(Debug)]
pub struct AgentOrchestrator {
    slots: DashMap<AgentKind, Arc<AgentSlot>>,
}

impl AgentOrchestrator {
    /// Create registry with the configured schedules and enabled flags
    #[must_use]
    pub fn new(config: &PlannerConfig) -> Self {
        let slots = DashMap::new();
        for kind in AgentKind::ALL {
            let settings = config.agent(kind);
            let descriptor = AgentDescriptor {
                id: kind,
                name: kind.display_name().to_string(),
                description: kind.description().to_string(),
                schedule: settings.schedule.unwrap_or_else(|| kind.default_schedule().to_string()),
            };
            slots.insert(
                kind,
                Arc::new(AgentSlot {
                    descriptor,
                    enabled: AtomicBool::new(settings.enabled),
                    running: AtomicBool::new(false),
                    completed: AtomicU64::new(0),
                    failed: AtomicU64::new(0),
                    last_run: Mutex::new(None),
                }),
            );
        }
        Self { slots }
    }

    fn slot(&self, kind: AgentKind) -> Result<Arc<AgentSlot>, FopError> {
        self.slots
            .get(&kind)
            .map(|slot| Arc::clone(slot.value()))
            .ok_or_else(|| FopError::NotFound {
                kind: "agent",
                id: kind.to_string(),
            })
    }

    /// Flip the enabled flag; an in-flight run is unaffected
    ///
    /// # Returns
    /// The new enabled state
    ///
    /// # Errors
    /// - `FopError::NotFound` if the agent is not registered
    pub fn toggle(&self, kind: AgentKind) -> Result<bool, FopError> {
        let slot = self.slot(kind)?;
        let enabled = !slot.enabled.fetch_xor(true, Ordering::AcqRel);
        tracing::info!(agent = %kind, enabled, "agent toggled");
        Ok(enabled)
    }

    /// Snapshot of one agent
    ///
    /// # Errors
    /// - `FopError::NotFound` if the agent is not registered
    pub fn status(&self, kind: AgentKind) -> Result<AgentStatus, FopError> {
        let slot = self.slot(kind)?;
        let last_run = slot.last_run.lock().clone();
        Ok(AgentStatus {
            descriptor: slot.descriptor.clone(),
            enabled: slot.enabled.load(Ordering::Acquire),
            running: slot.running.load(Ordering::Acquire),
            runs_completed: slot.completed.load(Ordering::Relaxed),
            runs_failed: slot.failed.load(Ordering::Relaxed),
            last_run,
        })
    }

    /// Snapshot of every agent, in registry order
    #[must_use]
    pub fn statuses(&self) -> Vec<AgentStatus> {
        AgentKind::ALL.into_iter().filter_map(|kind| self.status(kind).ok()).collect()
    }

    /// Number of enabled agents
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.enabled.load(Ordering::Acquire))
            .count()
    }

    /// Fail unless `kind` is switched on
    ///
    /// # Errors
    /// - `FopError::NotFound` if the agent is not registered
    /// - `FopError::AgentDisabled` if the agent is switched off
    pub fn ensure_enabled(&self, kind: AgentKind) -> Result<(), FopError> {
        self.enabled_slot(kind).map(drop)
    }

    fn enabled_slot(&self, kind: AgentKind) -> Result<Arc<AgentSlot>, FopError> {
        let slot = self.slot(kind)?;
        if !slot.enabled.load(Ordering::Acquire) {
            return Err(FopError::AgentDisabled(kind.to_string()));
        }
        Ok(slot)
    }

    /// Run one unit of work for `kind`
    ///
    /// The disabled check happens first and has no side effects. The running
    /// flag is then claimed atomically; it is released when `work` finishes
    /// or is dropped.
    ///
    /// # Errors
    /// - `FopError::AgentDisabled` if the agent is switched off
    /// - `FopError::AlreadyRunning` if a run is in flight
    /// - whatever `work` returns
    pub async fn run<F, Fut>(&self, kind: AgentKind, performed_by: &str, work: F) -> Result<AgentRunReport, FopError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AgentOutcome, FopError>>,
    {
        let slot = self.enabled_slot(kind)?;
        if slot
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(agent = %kind, "run refused: already running");
            return Err(FopError::AlreadyRunning(kind.to_string()));
        }
        let _guard = RunGuard(Arc::clone(&slot));

        let started_at = Utc::now();
        tracing::info!(agent = %kind, actor = %performed_by, "agent run started");
        match work().await {
            Ok(outcome) => {
                let report = AgentRunReport {
                    agent: kind,
                    performed_by: performed_by.to_string(),
                    started_at,
                    finished_at: Utc::now(),
                    outcome,
                };
                slot.completed.fetch_add(1, Ordering::Relaxed);
                *slot.last_run.lock() = Some(report.clone());
                tracing::info!(agent = %kind, "agent run completed");
                Ok(report)
            }
            Err(err) => {
                slot.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(agent = %kind, error = %err, "agent run failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentSettings;

    fn idle() -> Result<AgentOutcome, FopError> {
        Ok(AgentOutcome::Idle {
            message: "ok".to_string(),
        })
    }

    #[test]
    fn registry_has_reference_agents() {
        let orchestrator = AgentOrchestrator::new(&PlannerConfig::default());
        let statuses = orchestrator.statuses();
        assert_eq!(statuses.len(), 4);
        assert_eq!(statuses[0].descriptor.schedule, "Daily at 02:00 UTC");
        assert_eq!(statuses[3].descriptor.schedule, "On-demand");
        assert!(statuses.iter().all(|s| s.enabled && !s.running));
        assert_eq!(orchestrator.active_count(), 4);
    }

    #[test]
    fn config_overrides_schedule_and_flag() {
        let config = PlannerConfig::default().with_agent(
            AgentKind::ExecutionMonitor,
            AgentSettings {
                schedule: Some("Hourly".to_string()),
                enabled: false,
            },
        );
        let orchestrator = AgentOrchestrator::new(&config);
        let status = orchestrator.status(AgentKind::ExecutionMonitor).unwrap();
        assert_eq!(status.descriptor.schedule, "Hourly");
        assert!(!status.enabled);
    }

    #[test]
    fn parse_agent_ids() {
        assert_eq!("plan_optimizer".parse::<AgentKind>().unwrap(), AgentKind::PlanOptimizer);
        assert_eq!("plan-optimizer".parse::<AgentKind>().unwrap(), AgentKind::PlanOptimizer);
        assert!(matches!(
            "cost_predictor".parse::<AgentKind>(),
            Err(FopError::NotFound { kind: "agent", .. })
        ));
    }

    #[test]
    fn toggle_flips() {
        let orchestrator = AgentOrchestrator::new(&PlannerConfig::default());
        assert!(!orchestrator.toggle(AgentKind::PlanOptimizer).unwrap());
        assert!(orchestrator.toggle(AgentKind::PlanOptimizer).unwrap());
    }

    #[test]
    fn ensure_enabled_follows_toggle() {
        let orchestrator = AgentOrchestrator::new(&PlannerConfig::default());
        assert!(orchestrator.ensure_enabled(AgentKind::FinopsAssistant).is_ok());
        orchestrator.toggle(AgentKind::FinopsAssistant).unwrap();
        assert!(matches!(
            orchestrator.ensure_enabled(AgentKind::FinopsAssistant),
            Err(FopError::AgentDisabled(_))
        ));
    }

    #[tokio::test]
    async fn disabled_agent_does_not_run() {
        let orchestrator = AgentOrchestrator::new(&PlannerConfig::default());
        orchestrator.toggle(AgentKind::ExecutionMonitor).unwrap();

        let mut called = false;
        let err = orchestrator
            .run(AgentKind::ExecutionMonitor, "ops", || {
                called = true;
                async { idle() }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FopError::AgentDisabled(_)));
        assert!(!called);
        let status = orchestrator.status(AgentKind::ExecutionMonitor).unwrap();
        assert_eq!(status.runs_completed + status.runs_failed, 0);
    }

    #[tokio::test]
    async fn failure_clears_running_flag() {
        let orchestrator = AgentOrchestrator::new(&PlannerConfig::default());
        let err = orchestrator
            .run(AgentKind::PlanOptimizer, "ops", || async {
                Err(FopError::RecommendationGenerationFailed("boom".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FopError::RecommendationGenerationFailed(_)));

        let status = orchestrator.status(AgentKind::PlanOptimizer).unwrap();
        assert!(!status.running);
        assert_eq!(status.runs_failed, 1);

        let report = orchestrator
            .run(AgentKind::PlanOptimizer, "ops", || async { idle() })
            .await
            .unwrap();
        assert_eq!(report.agent, AgentKind::PlanOptimizer);
    }

    #[tokio::test]
    async fn second_run_while_first_in_flight_is_refused() {
        let orchestrator = Arc::new(AgentOrchestrator::new(&PlannerConfig::default()));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let first = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .run(AgentKind::ExecutionMonitor, "ops", || async move {
                        let _ = rx.await;
                        idle()
                    })
                    .await
            })
        };

        while !orchestrator.status(AgentKind::ExecutionMonitor).unwrap().running {
            tokio::task::yield_now().await;
        }
        let err = orchestrator
            .run(AgentKind::ExecutionMonitor, "ops", || async { idle() })
            .await
            .unwrap_err();
        assert!(matches!(err, FopError::AlreadyRunning(_)));

        // other agents are unaffected
        assert!(orchestrator
            .run(AgentKind::FinopsAssistant, "ops", || async { idle() })
            .await
            .is_ok());

        tx.send(()).unwrap();
        assert!(first.await.unwrap().is_ok());
        assert!(!orchestrator.status(AgentKind::ExecutionMonitor).unwrap().running);
    }

    #[test]
    fn report_serializes_flat() {
        let report = AgentRunReport {
            agent: AgentKind::PlanOptimizer,
            performed_by: "ops".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            outcome: AgentOutcome::Idle {
                message: "nominal".to_string(),
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["agent"], "plan_optimizer");
        assert_eq!(json["outcome"], "idle");
        assert_eq!(json["message"], "nominal");
    }
}
