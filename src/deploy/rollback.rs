// ABOUTME: Manual rollback between the blue and green slots.
// ABOUTME: Points production back at the standby slot while it still has targets.

use crate::elb::{ListenerOps, TargetGroupOps};
use crate::registrar::DeploymentGroup;
use crate::retry::RetryPolicy;
use crate::rules::{RuleController, RuleError, Routing, TestTrafficRule};
use crate::types::{LoadBalancerArn, Slot};

use super::DeployError;

/// Manual rollback - swap the active and standby slots.
///
/// This function:
/// 1. Reads which slot serves production traffic
/// 2. Checks the standby slot still has registered targets
/// 3. Promotes the standby slot on the production listener
/// 4. Removes any test-isolation rules
///
/// Rolling back twice returns to the original slot.
///
/// Returns the slot now serving production.
///
/// # Errors
///
/// - `SplitTraffic` if production is divided between the slots
/// - `NoPreviousDeployment` if the standby slot has no targets
/// - `RollbackFailed` if the listener could not be rewritten
pub async fn manual_rollback<B: ListenerOps + TargetGroupOps>(
    balancer: &B,
    group: &DeploymentGroup,
    alb: &LoadBalancerArn,
    test_traffic: &TestTrafficRule,
    retry: RetryPolicy,
) -> Result<Slot, DeployError> {
    let rules = RuleController::new(balancer, retry);
    let pair = &group.target_groups;

    let active = match rules.routing(alb, &group.prod_listener, pair).await? {
        Routing::Slot(slot) => slot,
        Routing::Split { blue, green } => return Err(DeployError::SplitTraffic { blue, green }),
        Routing::Foreign => {
            return Err(DeployError::Precondition(format!(
                "production listener {} forwards outside {}'s target groups",
                group.prod_listener, group.name
            )));
        }
    };
    let standby = active.other();
    let target = pair.get(standby);

    if rules.registered_targets(target).await?.is_empty() {
        return Err(DeployError::NoPreviousDeployment(format!(
            "{standby} slot ({target}) has no registered targets"
        )));
    }

    let revert = async {
        rules.promote(alb, &group.prod_listener, target).await?;
        for listener in [&group.test_listener, &group.prod_listener] {
            rules.clear_rules(alb, listener, &test_traffic.header).await?;
        }
        Ok::<(), RuleError>(())
    };
    revert
        .await
        .map_err(|source| DeployError::RollbackFailed {
            cause: "manual rollback".to_string(),
            source,
        })?;

    tracing::info!(
        "Rolled back {}: production moved from {} to {} slot",
        group.name,
        active,
        standby
    );
    Ok(standby)
}
