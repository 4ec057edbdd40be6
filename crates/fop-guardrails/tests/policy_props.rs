use chrono::Utc;
use fop_guardrails::{GuardrailId, GuardrailPolicy, Stage};
use fop_model::{
    ActionPlan, Environment, Opportunity, OpportunityType, PlanId, PlanStatus, RiskLevel, Service,
};
use proptest::prelude::*;

fn env_strategy() -> impl Strategy<Value = Environment> {
    prop_oneof![
        Just(Environment::Dev),
        Just(Environment::Test),
        Just(Environment::Prod),
    ]
}

fn stage_strategy() -> impl Strategy<Value = Stage> {
    prop_oneof![
        Just(Stage::Creation),
        Just(Stage::Approve),
        Just(Stage::Execute),
        Just(Stage::Rollback),
    ]
}

fn build_plan(plan_env: Environment, envs: &[Environment], rollback: usize, window: bool) -> ActionPlan {
    let top_opportunities: Vec<Opportunity> = envs
        .iter()
        .enumerate()
        .map(|(i, env)| {
            Opportunity::new(
                format!("opp-{i}"),
                Service::Ec2,
                OpportunityType::Ec2Offhours,
                format!("i-{i}"),
                *env,
                RiskLevel::Low,
                10.0,
            )
        })
        .collect();

    ActionPlan {
        plan_id: PlanId::new("plan-prop").unwrap(),
        objective: "prop".to_string(),
        env: plan_env,
        est_total_savings_usd_month: 10.0 * top_opportunities.len() as f64,
        top_opportunities,
        recommended_steps: vec!["Stop instances".to_string()],
        guardrails_checked: Vec::new(),
        rollback_plan: (0..rollback).map(|i| format!("undo {i}")).collect(),
        maintenance_window: if window { "19:00-07:00".to_string() } else { String::new() },
        reported_total_usd_month: None,
        status: PlanStatus::Planned,
        version: 0,
        created_at: Utc::now(),
        created_by: "prop".to_string(),
        approved_by: None,
        approved_at: None,
        executed_at: None,
        execution_details: None,
        rolled_back_at: None,
        rollback_reason: None,
    }
}

proptest! {
    #[test]
    fn prop_evaluation_is_deterministic(
        plan_env in env_strategy(),
        envs in proptest::collection::vec(env_strategy(), 0..8),
        rollback in 0..3usize,
        window in any::<bool>(),
        stage in stage_strategy(),
    ) {
        let plan = build_plan(plan_env, &envs, rollback, window);
        let policy = GuardrailPolicy::default();
        prop_assert_eq!(policy.evaluate(&plan, stage), policy.evaluate(&plan, stage));
    }

    #[test]
    fn prop_passing_plan_never_touches_prod(
        plan_env in env_strategy(),
        envs in proptest::collection::vec(env_strategy(), 0..8),
        rollback in 0..3usize,
        window in any::<bool>(),
    ) {
        let plan = build_plan(plan_env, &envs, rollback, window);
        if GuardrailPolicy::default().evaluate(&plan, Stage::Creation).is_ok() {
            prop_assert!(plan.env.is_mutable());
            prop_assert!(plan.top_opportunities.iter().all(|o| o.env.is_mutable()));
            prop_assert!(plan.top_opportunities.len() <= 5);
            prop_assert!(!plan.rollback_plan.is_empty());
        }
    }

    #[test]
    fn prop_first_failure_follows_canonical_order(
        plan_env in env_strategy(),
        envs in proptest::collection::vec(env_strategy(), 0..8),
        rollback in 0..3usize,
        window in any::<bool>(),
        stage in stage_strategy(),
    ) {
        let plan = build_plan(plan_env, &envs, rollback, window);
        let policy = GuardrailPolicy::default();
        match policy.evaluate(&plan, stage) {
            Ok(passed) => prop_assert_eq!(passed.as_slice(), stage.rules()),
            Err(violation) => {
                let position = stage.rules().iter().position(|r| *r == violation.guardrail);
                prop_assert!(position.is_some());
                for earlier in &stage.rules()[..position.unwrap_or(0)] {
                    prop_assert!(policy.check(*earlier, &plan).is_ok());
                }
            }
        }
    }
}

#[test]
fn rollback_stage_only_checks_rollback() {
    assert_eq!(Stage::Rollback.rules(), &[GuardrailId::RollbackPresent]);
    let plan = build_plan(Environment::Prod, &[Environment::Prod; 7], 1, false);
    assert!(GuardrailPolicy::default().evaluate(&plan, Stage::Rollback).is_ok());
}
