// tests/queue_property.rs

//! Property tests for the cost queue's admission bookkeeping.

use proptest::prelude::*;

use backrun::queue::CostLedger;

#[derive(Debug, Clone)]
struct Op {
    cost: f64,
    exclusive: bool,
    release_oldest_first: bool,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    (0.0f64..50.0, any::<bool>(), any::<bool>()).prop_map(|(cost, exclusive, release)| Op {
        cost,
        exclusive,
        release_oldest_first: release,
    })
}

proptest! {
    /// Replaying any interleaving of admissions and releases, the ledger
    /// never exceeds its budget (except for a solitary exclusive job) and
    /// its counters match a shadow model.
    #[test]
    fn ledger_honors_budget_and_exclusivity(
        budget in 1.0f64..100.0,
        ops in proptest::collection::vec(op_strategy(), 1..200),
    ) {
        let mut ledger = CostLedger::new(budget);
        let mut running: Vec<(f64, bool)> = Vec::new();

        for op in ops {
            if op.release_oldest_first && !running.is_empty() {
                let (cost, exclusive) = running.remove(0);
                ledger.release(cost, exclusive);
            }

            let admissible = ledger.can_admit(op.cost, op.exclusive);

            if ledger.exclusive_active() {
                prop_assert!(!admissible);
            }
            if op.exclusive && !running.is_empty() {
                prop_assert!(!admissible);
            }

            if admissible {
                ledger.admit(op.cost, op.exclusive);
                running.push((op.cost, op.exclusive));

                if op.exclusive {
                    prop_assert_eq!(ledger.active(), 1);
                } else {
                    prop_assert!(ledger.active_cost() <= budget + 1e-6);
                }
            }

            prop_assert_eq!(ledger.active(), running.len());
            let expected: f64 = running.iter().map(|(c, _)| c).sum();
            prop_assert!((ledger.active_cost() - expected).abs() < 1e-6);
        }
    }

    /// Draining everything always returns the ledger to a pristine state.
    #[test]
    fn draining_resets_the_ledger(
        budget in 1.0f64..100.0,
        costs in proptest::collection::vec(0.0f64..20.0, 1..50),
    ) {
        let mut ledger = CostLedger::new(budget);
        let mut admitted = Vec::new();

        for cost in costs {
            if ledger.can_admit(cost, false) {
                ledger.admit(cost, false);
                admitted.push(cost);
            }
        }
        for cost in admitted {
            ledger.release(cost, false);
        }

        prop_assert_eq!(ledger.active(), 0);
        prop_assert_eq!(ledger.active_cost(), 0.0);
        prop_assert!(!ledger.exclusive_active());
        prop_assert!(ledger.can_admit(budget, false));
    }
}
