use fop_ledger::{AuditAction, AuditLedger, AuditQuery, NewAuditEntry, SortOrder};
use proptest::prelude::*;
use std::sync::Arc;

fn action_strategy() -> impl Strategy<Value = AuditAction> {
    prop_oneof![
        Just(AuditAction::PlanGenerated),
        Just(AuditAction::PlanApproved),
        Just(AuditAction::PlanExecuted),
        Just(AuditAction::PlanRolledBack),
    ]
}

proptest! {
    #[test]
    fn prop_per_plan_timestamps_strictly_increase(
        ops in proptest::collection::vec((0..4usize, action_strategy()), 1..40)
    ) {
        let ledger = AuditLedger::new();
        for (plan, action) in &ops {
            ledger.append(NewAuditEntry::new(*action, format!("plan-{plan}"), "prop")).unwrap();
        }

        for plan in 0..4 {
            let history = ledger.history(&format!("plan-{plan}"));
            for pair in history.windows(2) {
                prop_assert!(pair[0].created_at < pair[1].created_at);
            }
        }
        prop_assert_eq!(ledger.len(), ops.len());
        prop_assert!(ledger.verify_integrity().is_ok());
    }

    #[test]
    fn prop_desc_is_reverse_of_asc(
        ops in proptest::collection::vec((0..3usize, action_strategy()), 0..30),
        filter in proptest::option::of(action_strategy()),
    ) {
        let ledger = AuditLedger::new();
        for (plan, action) in &ops {
            ledger.append(NewAuditEntry::new(*action, format!("plan-{plan}"), "prop")).unwrap();
        }

        let mut query = AuditQuery::new();
        query.action = filter;
        let desc: Vec<u64> = ledger.list(query.clone()).map(|e| e.sequence).collect();
        let mut asc: Vec<u64> = ledger
            .list(query.with_order(SortOrder::Asc))
            .map(|e| e.sequence)
            .collect();
        asc.reverse();
        prop_assert_eq!(desc, asc);
    }
}

#[test]
fn concurrent_appends_keep_the_chain_valid() {
    let ledger = Arc::new(AuditLedger::new());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    ledger
                        .append(NewAuditEntry::new(AuditAction::PlanGenerated, format!("plan-{t}"), "worker"))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(ledger.len(), 200);
    assert!(ledger.verify_integrity().is_ok());
    for t in 0..8 {
        let history = ledger.history(&format!("plan-{t}"));
        assert_eq!(history.len(), 25);
        assert!(history.windows(2).all(|w| w[0].created_at < w[1].created_at));
    }
}
