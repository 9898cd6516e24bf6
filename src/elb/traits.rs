// ABOUTME: Composable capability traits for load balancer backends.
// ABOUTME: Defines ListenerOps for routing and TargetGroupOps for registration.

use async_trait::async_trait;

use super::error::BalancerError;
use super::model::{ForwardAction, Listener, ListenerRule, NewRule, TargetGroup};
use super::sealed::Sealed;
use crate::types::{ListenerArn, RuleArn, TargetGroupArn};

/// Listener and rule operations.
#[async_trait]
pub trait ListenerOps: Sealed + Send + Sync {
    /// Describe a listener including its default action and rules.
    async fn describe_listener(&self, listener: &ListenerArn) -> Result<Listener, BalancerError>;

    /// List the non-default rules on a listener.
    async fn describe_rules(
        &self,
        listener: &ListenerArn,
    ) -> Result<Vec<ListenerRule>, BalancerError>;

    /// Create a rule. Fails with `PriorityInUse` if another rule holds the priority.
    async fn create_rule(
        &self,
        listener: &ListenerArn,
        rule: &NewRule,
    ) -> Result<RuleArn, BalancerError>;

    /// Delete a rule.
    async fn delete_rule(&self, rule: &RuleArn) -> Result<(), BalancerError>;

    /// Replace a listener's default action.
    async fn modify_default_action(
        &self,
        listener: &ListenerArn,
        action: &ForwardAction,
    ) -> Result<(), BalancerError>;
}

/// Target group operations.
#[async_trait]
pub trait TargetGroupOps: Sealed + Send + Sync {
    /// Describe a target group and its registered targets.
    async fn describe_target_group(
        &self,
        target_group: &TargetGroupArn,
    ) -> Result<TargetGroup, BalancerError>;

    /// Register targets. Already registered targets are ignored.
    async fn register_targets(
        &self,
        target_group: &TargetGroupArn,
        targets: &[String],
    ) -> Result<(), BalancerError>;

    /// Deregister targets. Unknown targets are ignored.
    async fn deregister_targets(
        &self,
        target_group: &TargetGroupArn,
        targets: &[String],
    ) -> Result<(), BalancerError>;
}
