//! Concurrency tests - racing transitions and agent runs

use fop_core::prelude::*;
use fop_test_utils::{reference_opportunities, setup_planner_with, setup_test_planner, SlowRecommender, TEST_USER};
use futures::future::join_all;
use std::time::Duration;

#[tokio::test]
async fn test_racing_approvals_one_wins() {
    let planner = setup_test_planner(reference_opportunities());
    let plan = planner.generate_plan(PlanRequest::new(TEST_USER)).await.unwrap();

    let (a, b) = tokio::join!(
        planner.approve(&plan.plan_id, "alice@example.com"),
        planner.approve(&plan.plan_id, "bob@example.com"),
    );
    let results = [a, b];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(FopError::InvalidTransition { .. })))
        .count();
    assert_eq!((wins, refused), (1, 1));

    let approvals = planner
        .list_audit_log(
            AuditQuery::new()
                .for_plan(plan.plan_id.as_str())
                .with_action(AuditAction::PlanApproved),
        )
        .count();
    assert_eq!(approvals, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_transitions_across_tasks() {
    let planner = Arc::new(setup_test_planner(reference_opportunities()));
    let plan = planner.generate_plan(PlanRequest::new(TEST_USER)).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let planner = Arc::clone(&planner);
            let id = plan.plan_id.clone();
            tokio::spawn(async move { planner.approve(&id, &format!("user-{i}@example.com")).await })
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(err) => assert!(matches!(err, FopError::InvalidTransition { .. }), "{err:?}"),
        }
    }
    assert_eq!(wins, 1);

    let stored = planner.get_plan(&plan.plan_id).await.unwrap();
    assert_eq!(stored.status, PlanStatus::Approved);
    assert_eq!(stored.version, 2);
    planner.verify_audit_log().unwrap();
}

#[tokio::test]
async fn test_racing_executions_on_one_task() {
    let planner = setup_test_planner(reference_opportunities());
    let plan = planner.generate_plan(PlanRequest::new(TEST_USER)).await.unwrap();
    planner.approve(&plan.plan_id, TEST_USER).await.unwrap();

    let results = join_all((0..5).map(|_| planner.execute(&plan.plan_id, TEST_USER))).await;
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, FopError::InvalidTransition { from: PlanStatus::Executed, .. })));

    let executions = planner
        .list_audit_log(AuditQuery::new().with_action(AuditAction::PlanExecuted))
        .count();
    assert_eq!(executions, 1);
}

#[tokio::test]
async fn test_independent_plans_transition_concurrently() {
    let planner = setup_test_planner(reference_opportunities());
    let first = planner.generate_plan(PlanRequest::new(TEST_USER)).await.unwrap();
    let second = planner.generate_plan(PlanRequest::new(TEST_USER)).await.unwrap();
    assert_ne!(first.plan_id, second.plan_id);

    let (a, b) = tokio::join!(
        planner.approve(&first.plan_id, TEST_USER),
        planner.approve(&second.plan_id, TEST_USER),
    );
    assert!(a.is_ok());
    assert!(b.is_ok());
}

#[tokio::test]
async fn test_agent_runs_are_exclusive() {
    let planner = setup_planner_with(
        reference_opportunities(),
        Arc::new(SlowRecommender(Duration::from_millis(50))),
    );

    let (a, b) = tokio::join!(
        planner.run_agent(AgentKind::PlanOptimizer),
        planner.run_agent(AgentKind::PlanOptimizer),
    );
    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(FopError::AlreadyRunning(_))))
            .count(),
        1
    );

    let generated = planner
        .list_audit_log(AuditQuery::new().with_action(AuditAction::PlanGenerated))
        .count();
    assert_eq!(generated, 1);

    let status = planner
        .agents()
        .into_iter()
        .find(|s| s.descriptor.id == AgentKind::PlanOptimizer)
        .unwrap();
    assert!(!status.running);
    assert_eq!(status.runs_completed, 1);
}

#[tokio::test]
async fn test_different_agents_run_side_by_side() {
    let planner = setup_planner_with(
        reference_opportunities(),
        Arc::new(SlowRecommender(Duration::from_millis(20))),
    );

    let (a, b) = tokio::join!(
        planner.run_agent(AgentKind::PlanOptimizer),
        planner.run_agent(AgentKind::OpportunityDiscoverer),
    );
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(planner.list_plans().await.unwrap().len(), 2);
}
