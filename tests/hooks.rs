// ABOUTME: Integration tests for lifecycle hook dispatch against a balancer.
// ABOUTME: Covers the three explicit handlers, replay, ordering and reported statuses.

mod support;

use switchyard::elb::{ForwardAction, ListenerOps, MemoryBalancer, Operation, TargetGroupOps};
use switchyard::hooks::{FailureReason, HookName, HookRegistry, HookRequest, HookStatus};
use switchyard::rules::TestTrafficRule;
use switchyard::types::DeploymentId;

use support::{alb, blue, green, prod, test_listener};

fn registry() -> HookRegistry<MemoryBalancer> {
    HookRegistry::standard(TestTrafficRule::default())
}

fn request(hook: HookName, deployment: &str) -> HookRequest {
    HookRequest {
        hook_name: hook,
        deployment_id: DeploymentId::new(deployment),
        lifecycle_event_hook_execution_id: Some(format!("exec-{hook}")),
        alb_arn: alb(),
        prod_listener_arn: prod(),
        test_listener_arn: test_listener(),
        target_group_arn_x: blue(),
        target_group_arn_y: green(),
    }
}

async fn register_green(balancer: &MemoryBalancer) {
    balancer
        .register_targets(&green(), &["books-d-1-1".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn full_hook_sequence_isolates_then_clears_test_traffic() {
    support::init_tracing();
    let balancer = support::balancer().await;
    register_green(&balancer).await;
    let registry = registry();

    let response = registry
        .dispatch(&balancer, &request(HookName::BeforeInstall, "d-1"))
        .await;
    assert_eq!(response.status, HookStatus::Succeeded);

    let response = registry
        .dispatch(&balancer, &request(HookName::AfterAllowTestTraffic, "d-1"))
        .await;
    assert_eq!(response.status, HookStatus::Succeeded);
    let rules = balancer.describe_rules(&test_listener()).await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].action, ForwardAction::single(green()));

    let response = registry
        .dispatch(&balancer, &request(HookName::BeforeAllowTraffic, "d-1"))
        .await;
    assert_eq!(response.status, HookStatus::Succeeded);
    assert!(balancer.describe_rules(&test_listener()).await.unwrap().is_empty());

    // Production never moved during the hooks.
    let listener = balancer.describe_listener(&prod()).await.unwrap();
    assert_eq!(listener.default_action, ForwardAction::single(blue()));
}

#[tokio::test]
async fn response_echoes_request_identity() {
    let balancer = support::balancer().await;
    let registry = registry();

    let response = registry
        .dispatch(&balancer, &request(HookName::BeforeInstall, "d-echo"))
        .await;

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["deploymentId"], "d-echo");
    assert_eq!(json["lifecycleEventHookExecutionId"], "exec-BeforeInstall");
    assert_eq!(json["hookName"], "BeforeInstall");
    assert_eq!(json["status"], "Succeeded");
}

#[tokio::test]
async fn replayed_hook_succeeds_without_touching_the_balancer() {
    let balancer = support::balancer().await;
    register_green(&balancer).await;
    let registry = registry();
    registry
        .dispatch(&balancer, &request(HookName::BeforeInstall, "d-2"))
        .await;
    registry
        .dispatch(&balancer, &request(HookName::AfterAllowTestTraffic, "d-2"))
        .await;
    let creates = balancer.calls(Operation::CreateRule);
    let describes = balancer.calls(Operation::DescribeListener);

    let response = registry
        .dispatch(&balancer, &request(HookName::AfterAllowTestTraffic, "d-2"))
        .await;

    assert_eq!(response.status, HookStatus::Succeeded);
    assert_eq!(balancer.calls(Operation::CreateRule), creates);
    assert_eq!(balancer.calls(Operation::DescribeListener), describes);
    assert_eq!(
        registry
            .ledger()
            .record_of(&DeploymentId::new("d-2"), HookName::AfterAllowTestTraffic)
            .map(|r| r.attempts),
        Some(1)
    );
}

#[tokio::test]
async fn out_of_order_hook_fails_before_any_mutation() {
    let balancer = support::balancer().await;
    register_green(&balancer).await;
    let registry = registry();

    let response = registry
        .dispatch(&balancer, &request(HookName::BeforeAllowTraffic, "d-3"))
        .await;

    assert_eq!(
        response.status,
        HookStatus::Failed(FailureReason::OutOfOrder {
            hook: HookName::BeforeAllowTraffic,
            missing: HookName::BeforeInstall,
        })
    );
    assert_eq!(balancer.calls(Operation::DescribeListener), 0);
}

#[tokio::test]
async fn test_traffic_requires_replacement_targets() {
    let balancer = support::balancer().await;
    let registry = registry();
    registry
        .dispatch(&balancer, &request(HookName::BeforeInstall, "d-4"))
        .await;

    let response = registry
        .dispatch(&balancer, &request(HookName::AfterAllowTestTraffic, "d-4"))
        .await;

    assert!(matches!(
        response.status,
        HookStatus::Failed(FailureReason::Precondition { .. })
    ));
    assert!(balancer.describe_rules(&test_listener()).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_listener_reports_resource_not_found() {
    let balancer = MemoryBalancer::new();
    let registry = registry();

    let response = registry
        .dispatch(&balancer, &request(HookName::BeforeInstall, "d-5"))
        .await;

    assert!(matches!(
        response.status,
        HookStatus::Failed(FailureReason::ResourceNotFound { .. })
    ));
}

#[tokio::test]
async fn failed_hook_can_be_retried() {
    let balancer = support::balancer().await;
    let registry = registry();
    registry
        .dispatch(&balancer, &request(HookName::BeforeInstall, "d-6"))
        .await;
    let failed = registry
        .dispatch(&balancer, &request(HookName::AfterAllowTestTraffic, "d-6"))
        .await;
    assert!(!failed.status.is_success());

    register_green(&balancer).await;
    let retried = registry
        .dispatch(&balancer, &request(HookName::AfterAllowTestTraffic, "d-6"))
        .await;

    assert_eq!(retried.status, HookStatus::Succeeded);
    assert_eq!(
        registry
            .ledger()
            .record_of(&DeploymentId::new("d-6"), HookName::AfterAllowTestTraffic)
            .map(|r| r.attempts),
        Some(2)
    );
}

#[tokio::test]
async fn before_install_clears_rules_from_an_abandoned_deployment() {
    let balancer = support::balancer().await;
    register_green(&balancer).await;
    let registry = registry();
    registry
        .dispatch(&balancer, &request(HookName::BeforeInstall, "d-old"))
        .await;
    registry
        .dispatch(&balancer, &request(HookName::AfterAllowTestTraffic, "d-old"))
        .await;
    assert_eq!(balancer.describe_rules(&test_listener()).await.unwrap().len(), 1);

    let response = registry
        .dispatch(&balancer, &request(HookName::BeforeInstall, "d-new"))
        .await;

    assert_eq!(response.status, HookStatus::Succeeded);
    assert!(balancer.describe_rules(&test_listener()).await.unwrap().is_empty());
}
