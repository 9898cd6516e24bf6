// ABOUTME: Integration tests for the listener rule controller.
// ABOUTME: Covers isolation idempotence, cleanup, promotion read-back and fault handling.

mod support;

use nonempty::NonEmpty;
use proptest::prelude::*;
use std::collections::BTreeMap;

use switchyard::elb::{
    BalancerError, ForwardAction, ListenerOps, MemoryBalancer, NewRule, Operation, RuleCondition,
};
use switchyard::retry::RetryPolicy;
use switchyard::rules::{RuleController, RuleError, Routing, TestTrafficRule};
use switchyard::types::{ListenerArn, LoadBalancerArn, Slot, SlotPair, SlotRole};

use support::{alb, blue, green, prod, test_listener};

fn pair() -> SlotPair {
    SlotPair::new(blue(), green()).unwrap()
}

async fn isolation_rules(balancer: &MemoryBalancer, listener: &ListenerArn) -> usize {
    balancer
        .describe_rules(listener)
        .await
        .unwrap()
        .iter()
        .filter(|r| r.is_test_isolation("counter_no"))
        .count()
}

// =============================================================================
// Test Traffic Isolation
// =============================================================================

#[tokio::test]
async fn isolation_routes_header_to_target() {
    support::init_tracing();
    let balancer = support::balancer().await;
    let rules = RuleController::new(&balancer, RetryPolicy::default());

    let handle = rules
        .isolate_test_traffic(&alb(), &test_listener(), &green(), &TestTrafficRule::default())
        .await
        .unwrap();

    assert!(handle.created);
    assert_eq!(handle.priority, 1);
    let installed = balancer.describe_rules(&test_listener()).await.unwrap();
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0].action, ForwardAction::single(green()));
    // Default action is untouched.
    let listener = balancer.describe_listener(&test_listener()).await.unwrap();
    assert_eq!(listener.default_action, ForwardAction::single(blue()));
}

#[tokio::test]
async fn isolation_replaces_stale_rule_for_other_slot() {
    let balancer = support::balancer().await;
    let rules = RuleController::new(&balancer, RetryPolicy::default());
    let matcher = TestTrafficRule::default();

    rules
        .isolate_test_traffic(&alb(), &test_listener(), &blue(), &matcher)
        .await
        .unwrap();
    rules
        .isolate_test_traffic(&alb(), &test_listener(), &green(), &matcher)
        .await
        .unwrap();

    let installed = balancer.describe_rules(&test_listener()).await.unwrap();
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0].action, ForwardAction::single(green()));
}

#[tokio::test]
async fn isolation_skips_priorities_held_by_unrelated_rules() {
    let balancer = support::balancer().await;
    let unrelated = NewRule {
        priority: 1,
        conditions: vec![RuleCondition::PathPattern {
            values: vec!["/health".into()],
        }],
        action: ForwardAction::single(blue()),
        tags: BTreeMap::new(),
    };
    balancer.create_rule(&test_listener(), &unrelated).await.unwrap();

    let rules = RuleController::new(&balancer, RetryPolicy::default());
    let handle = rules
        .isolate_test_traffic(&alb(), &test_listener(), &green(), &TestTrafficRule::default())
        .await
        .unwrap();

    assert_eq!(handle.priority, 2);
    assert_eq!(balancer.describe_rules(&test_listener()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn failed_verification_removes_the_new_rule() {
    let balancer = support::balancer().await;
    balancer.inject(
        Operation::DescribeRules,
        BalancerError::Backend("describe failed".into()),
        1,
    );
    let rules = RuleController::new(&balancer, RetryPolicy::none());

    let result = rules
        .isolate_test_traffic(&alb(), &test_listener(), &green(), &TestTrafficRule::default())
        .await;

    assert!(result.is_err());
    assert_eq!(balancer.calls(Operation::CreateRule), 1);
    assert_eq!(balancer.calls(Operation::DeleteRule), 1);
    assert_eq!(isolation_rules(&balancer, &test_listener()).await, 0);
}

#[tokio::test(start_paused = true)]
async fn throttled_create_is_retried() {
    let balancer = support::balancer().await;
    balancer.inject(Operation::CreateRule, BalancerError::Throttled("slow down".into()), 2);
    let rules = RuleController::new(&balancer, RetryPolicy::default());

    let handle = rules
        .isolate_test_traffic(&alb(), &test_listener(), &green(), &TestTrafficRule::default())
        .await
        .unwrap();

    assert!(handle.created);
    assert_eq!(balancer.calls(Operation::CreateRule), 3);
}

#[tokio::test(start_paused = true)]
async fn persistent_throttling_is_a_rule_application_failure() {
    let balancer = support::balancer().await;
    balancer.inject(Operation::CreateRule, BalancerError::Throttled("slow down".into()), 10);
    let rules = RuleController::new(&balancer, RetryPolicy::default());

    let err = rules
        .isolate_test_traffic(&alb(), &test_listener(), &green(), &TestTrafficRule::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RuleError::RuleApplicationFailure { attempts: 3, .. }
    ));
    assert_eq!(isolation_rules(&balancer, &test_listener()).await, 0);
}

#[tokio::test]
async fn missing_listener_is_resource_not_found() {
    let balancer = support::balancer().await;
    let rules = RuleController::new(&balancer, RetryPolicy::default());

    let err = rules
        .isolate_test_traffic(
            &alb(),
            &ListenerArn::new("listener/missing"),
            &green(),
            &TestTrafficRule::default(),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = rules
        .promote(&LoadBalancerArn::new("alb/other"), &prod(), &green())
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "listener on another balancer: {err}");
}

// =============================================================================
// Cleanup
// =============================================================================

#[tokio::test]
async fn clearing_twice_is_a_no_op() {
    let balancer = support::balancer().await;
    let rules = RuleController::new(&balancer, RetryPolicy::default());
    rules
        .isolate_test_traffic(&alb(), &test_listener(), &green(), &TestTrafficRule::default())
        .await
        .unwrap();

    assert_eq!(rules.clear_rules(&alb(), &test_listener(), "counter_no").await.unwrap(), 1);
    let deletes = balancer.calls(Operation::DeleteRule);
    assert_eq!(rules.clear_rules(&alb(), &test_listener(), "counter_no").await.unwrap(), 0);
    assert_eq!(balancer.calls(Operation::DeleteRule), deletes);
}

#[tokio::test]
async fn clearing_recognises_untagged_header_rules_and_spares_others() {
    let balancer = support::balancer().await;
    let foreign_header = NewRule {
        priority: 7,
        conditions: vec![RuleCondition::HttpHeader {
            name: "counter_no".into(),
            values: vec!["12345".into()],
        }],
        action: ForwardAction::single(green()),
        tags: BTreeMap::new(),
    };
    let unrelated = NewRule {
        priority: 8,
        conditions: vec![RuleCondition::HttpHeader {
            name: "x-canary".into(),
            values: vec!["1".into()],
        }],
        action: ForwardAction::single(green()),
        tags: BTreeMap::new(),
    };
    balancer.create_rule(&prod(), &foreign_header).await.unwrap();
    balancer.create_rule(&prod(), &unrelated).await.unwrap();

    let rules = RuleController::new(&balancer, RetryPolicy::default());
    assert_eq!(rules.clear_rules(&alb(), &prod(), "counter_no").await.unwrap(), 1);

    let left = balancer.describe_rules(&prod()).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].priority, 8);
}

#[tokio::test]
async fn rule_deleted_concurrently_counts_as_removed() {
    let balancer = support::balancer().await;
    let rules = RuleController::new(&balancer, RetryPolicy::default());
    rules
        .isolate_test_traffic(&alb(), &test_listener(), &green(), &TestTrafficRule::default())
        .await
        .unwrap();
    balancer.inject(Operation::DeleteRule, BalancerError::RuleNotFound("gone".into()), 1);

    let removed = rules
        .clear_rules(&alb(), &test_listener(), "counter_no")
        .await
        .unwrap();
    assert_eq!(removed, 0);
}

// =============================================================================
// Promotion
// =============================================================================

#[tokio::test]
async fn promote_reads_back_the_new_slot() {
    let balancer = support::balancer().await;
    let rules = RuleController::new(&balancer, RetryPolicy::default());

    rules.promote(&alb(), &prod(), &green()).await.unwrap();

    assert_eq!(
        rules.routing(&alb(), &prod(), &pair()).await.unwrap(),
        Routing::Slot(Slot::Green)
    );
    // Promoting again does not write.
    let writes = balancer.calls(Operation::ModifyDefaultAction);
    rules.promote(&alb(), &prod(), &green()).await.unwrap();
    assert_eq!(balancer.calls(Operation::ModifyDefaultAction), writes);
}

#[tokio::test]
async fn shift_splits_production_traffic() {
    let balancer = support::balancer().await;
    let rules = RuleController::new(&balancer, RetryPolicy::default());

    rules.shift(&alb(), &prod(), &blue(), &green(), 30).await.unwrap();

    assert_eq!(
        rules.routing(&alb(), &prod(), &pair()).await.unwrap(),
        Routing::Split { blue: 70, green: 30 }
    );
}

#[tokio::test]
async fn slot_roles_follow_listener_state() {
    let balancer = support::balancer().await;
    let rules = RuleController::new(&balancer, RetryPolicy::default());

    let roles = rules
        .slot_roles(&alb(), &prod(), &test_listener(), &pair(), "counter_no")
        .await
        .unwrap();
    assert_eq!(roles, vec![(Slot::Blue, SlotRole::Active), (Slot::Green, SlotRole::Standby)]);

    rules
        .isolate_test_traffic(&alb(), &test_listener(), &green(), &TestTrafficRule::default())
        .await
        .unwrap();
    let roles = rules
        .slot_roles(&alb(), &prod(), &test_listener(), &pair(), "counter_no")
        .await
        .unwrap();
    assert_eq!(roles, vec![(Slot::Blue, SlotRole::Active), (Slot::Green, SlotRole::TestOnly)]);
}

// =============================================================================
// Properties
// =============================================================================

fn header_values() -> impl Strategy<Value = NonEmpty<String>> {
    prop::collection::vec("[0-9]{5}", 1..4)
        .prop_map(|v| NonEmpty::from_vec(v).expect("strategy yields at least one value"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Applying the same isolation any number of times leaves exactly one rule.
    #[test]
    fn isolation_is_idempotent(values in header_values(), priority in 1u32..20, repeats in 1usize..5) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let balancer = support::balancer().await;
            let rules = RuleController::new(&balancer, RetryPolicy::default());
            let matcher = TestTrafficRule {
                header: "counter_no".into(),
                values,
                priority,
            };

            let first = rules
                .isolate_test_traffic(&alb(), &test_listener(), &green(), &matcher)
                .await
                .unwrap();
            for _ in 0..repeats {
                let again = rules
                    .isolate_test_traffic(&alb(), &test_listener(), &green(), &matcher)
                    .await
                    .unwrap();
                prop_assert!(!again.created);
                prop_assert_eq!(&again.rule, &first.rule);
            }
            prop_assert_eq!(isolation_rules(&balancer, &test_listener()).await, 1);
            prop_assert_eq!(balancer.calls(Operation::CreateRule), 1);
            Ok(())
        })?;
    }

    /// Clearing after any number of isolations leaves no isolation rule.
    #[test]
    fn clear_after_isolate_leaves_nothing(repeats in 1usize..4) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let balancer = support::balancer().await;
            let rules = RuleController::new(&balancer, RetryPolicy::default());
            for _ in 0..repeats {
                rules
                    .isolate_test_traffic(&alb(), &test_listener(), &green(), &TestTrafficRule::default())
                    .await
                    .unwrap();
            }
            rules.clear_rules(&alb(), &test_listener(), "counter_no").await.unwrap();
            prop_assert_eq!(isolation_rules(&balancer, &test_listener()).await, 0);
            Ok(())
        })?;
    }
}
