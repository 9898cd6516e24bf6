// ABOUTME: Listener rule controller: test-traffic isolation, promotion and cleanup.
// ABOUTME: Every mutation re-reads listener state first and is safe to repeat.

use crate::elb::{
    BalancerError, ForwardAction, Listener, ListenerOps, ListenerRule, TargetGroup,
    TargetGroupOps,
};
use crate::retry::{Exhausted, RetryPolicy, Retryable};
use crate::types::{ListenerArn, LoadBalancerArn, RuleArn, Slot, SlotPair, SlotRole, TargetGroupArn};

use super::error::RuleError;
use super::matcher::TestTrafficRule;

/// Highest priority a listener rule may use.
const MAX_PRIORITY: u32 = 50_000;

/// Reference to an installed test-isolation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHandle {
    pub listener: ListenerArn,
    pub rule: RuleArn,
    pub priority: u32,
    pub target: TargetGroupArn,
    /// False when an identical rule was already in place.
    pub created: bool,
}

/// Where a listener's default action currently sends traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// All traffic goes to one slot.
    Slot(Slot),
    /// Traffic is split between the slots.
    Split { blue: u8, green: u8 },
    /// The default action forwards somewhere outside the slot pair.
    Foreign,
}

/// Applies routing changes to load balancer listeners.
pub struct RuleController<'a, B> {
    balancer: &'a B,
    retry: RetryPolicy,
}

impl<'a, B: ListenerOps + TargetGroupOps> RuleController<'a, B> {
    pub fn new(balancer: &'a B, retry: RetryPolicy) -> Self {
        Self { balancer, retry }
    }

    /// Route requests matching `matcher` on `listener` to `target`.
    ///
    /// Repeating the call with the same input leaves exactly one rule in
    /// place. Stale isolation rules (other values or another target) are
    /// replaced.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` if the listener or target group is missing.
    /// A rule created during a failed call is removed before returning.
    pub async fn isolate_test_traffic(
        &self,
        alb: &LoadBalancerArn,
        listener: &ListenerArn,
        target: &TargetGroupArn,
        matcher: &TestTrafficRule,
    ) -> Result<RuleHandle, RuleError> {
        let current = self.listener(alb, listener).await?;
        self.target_group(target).await?;

        let desired = matcher.conditions();
        let desired_action = ForwardAction::single(target.clone());
        let (matching, stale): (Vec<&ListenerRule>, Vec<&ListenerRule>) = current
            .rules
            .iter()
            .filter(|r| r.is_test_isolation(&matcher.header))
            .partition(|r| r.conditions == desired && r.action == desired_action);

        for rule in stale.iter().chain(matching.iter().skip(1)) {
            tracing::info!("Removing stale test rule {} on {}", rule.arn, listener);
            self.delete_rule(&rule.arn).await?;
        }

        if let Some(existing) = matching.first() {
            tracing::debug!("Test rule {} already in place on {}", existing.arn, listener);
            return Ok(RuleHandle {
                listener: listener.clone(),
                rule: existing.arn.clone(),
                priority: existing.priority,
                target: target.clone(),
                created: false,
            });
        }

        let in_use: Vec<u32> = current
            .rules
            .iter()
            .filter(|r| !r.is_test_isolation(&matcher.header))
            .map(|r| r.priority)
            .collect();
        let (rule, priority) = self
            .create_isolation_rule(listener, target, matcher, in_use)
            .await?;

        if let Err(e) = self.verify_isolation(listener, &rule, matcher).await {
            tracing::warn!("Test rule {} failed verification, removing it: {}", rule, e);
            return Err(self.compensate(&rule, e).await);
        }

        tracing::info!(
            "Installed test rule {} on {} ({}) -> {}",
            rule,
            listener,
            matcher.header,
            target
        );
        Ok(RuleHandle {
            listener: listener.clone(),
            rule,
            priority,
            target: target.clone(),
            created: true,
        })
    }

    /// Point the listener's default action entirely at `target`.
    pub async fn promote(
        &self,
        alb: &LoadBalancerArn,
        listener: &ListenerArn,
        target: &TargetGroupArn,
    ) -> Result<(), RuleError> {
        self.apply_default_action(alb, listener, ForwardAction::single(target.clone()))
            .await
    }

    /// Send `percent` of the listener's default traffic to `to`, the rest to `from`.
    pub async fn shift(
        &self,
        alb: &LoadBalancerArn,
        listener: &ListenerArn,
        from: &TargetGroupArn,
        to: &TargetGroupArn,
        percent: u8,
    ) -> Result<(), RuleError> {
        self.apply_default_action(
            alb,
            listener,
            ForwardAction::split(from.clone(), to.clone(), percent),
        )
        .await
    }

    /// Remove every test-isolation rule keyed on `header` from the listener.
    ///
    /// Returns how many rules were removed; zero on a clean listener.
    pub async fn clear_rules(
        &self,
        alb: &LoadBalancerArn,
        listener: &ListenerArn,
        header: &str,
    ) -> Result<usize, RuleError> {
        let current = self.listener(alb, listener).await?;
        let mut removed = 0;

        for rule in current.rules.iter().filter(|r| r.is_test_isolation(header)) {
            tracing::info!("Removing test rule {} on {}", rule.arn, listener);
            if self.delete_rule(&rule.arn).await? {
                removed += 1;
            }
        }

        if removed == 0 {
            tracing::debug!("No test rules on {}", listener);
        }
        Ok(removed)
    }

    /// Test-isolation rules currently on the listener.
    pub async fn test_rules(
        &self,
        alb: &LoadBalancerArn,
        listener: &ListenerArn,
        header: &str,
    ) -> Result<Vec<ListenerRule>, RuleError> {
        let current = self.listener(alb, listener).await?;
        Ok(current
            .rules
            .into_iter()
            .filter(|r| r.is_test_isolation(header))
            .collect())
    }

    /// Targets registered in a target group.
    pub async fn registered_targets(
        &self,
        target: &TargetGroupArn,
    ) -> Result<Vec<String>, RuleError> {
        Ok(self.target_group(target).await?.targets)
    }

    /// Read where the listener's default action points.
    pub async fn routing(
        &self,
        alb: &LoadBalancerArn,
        listener: &ListenerArn,
        pair: &SlotPair,
    ) -> Result<Routing, RuleError> {
        let current = self.listener(alb, listener).await?;
        Ok(routing_of(&current.default_action, pair))
    }

    /// Roles of both slots given the production and test listeners.
    pub async fn slot_roles(
        &self,
        alb: &LoadBalancerArn,
        prod: &ListenerArn,
        test: &ListenerArn,
        pair: &SlotPair,
        header: &str,
    ) -> Result<Vec<(Slot, SlotRole)>, RuleError> {
        let prod = self.listener(alb, prod).await?;
        let test = self.listener(alb, test).await?;

        let roles = pair
            .iter()
            .map(|(slot, tg)| {
                let role = if prod.default_action.weight_of(tg) > 0 {
                    SlotRole::Active
                } else if test
                    .rules
                    .iter()
                    .chain(prod.rules.iter())
                    .any(|r| r.is_test_isolation(header) && r.action.references(tg))
                {
                    SlotRole::TestOnly
                } else {
                    SlotRole::Standby
                };
                (slot, role)
            })
            .collect();
        Ok(roles)
    }

    async fn listener(
        &self,
        alb: &LoadBalancerArn,
        listener: &ListenerArn,
    ) -> Result<Listener, RuleError> {
        let balancer = self.balancer;
        let current = self
            .retry
            .run(move || balancer.describe_listener(listener))
            .await?;
        if &current.load_balancer != alb {
            return Err(RuleError::ResourceNotFound(format!(
                "listener {} on load balancer {}",
                listener, alb
            )));
        }
        Ok(current)
    }

    async fn target_group(&self, target: &TargetGroupArn) -> Result<TargetGroup, RuleError> {
        let balancer = self.balancer;
        Ok(self
            .retry
            .run(move || balancer.describe_target_group(target))
            .await?)
    }

    async fn apply_default_action(
        &self,
        alb: &LoadBalancerArn,
        listener: &ListenerArn,
        action: ForwardAction,
    ) -> Result<(), RuleError> {
        let current = self.listener(alb, listener).await?;
        for target in &action.targets {
            self.target_group(&target.target_group).await?;
        }

        if current.default_action == action {
            tracing::debug!("Default action on {} already up to date", listener);
            return Ok(());
        }

        let balancer = self.balancer;
        let wanted = &action;
        self.retry
            .run(move || balancer.modify_default_action(listener, wanted))
            .await?;

        let after = self.listener(alb, listener).await?;
        if after.default_action != action {
            return Err(RuleError::Unverified(format!(
                "default action on {} did not read back as written",
                listener
            )));
        }
        tracing::info!("Default action on {} now {}", listener, describe(&action));
        Ok(())
    }

    /// Create the rule, moving to the next free priority on collisions.
    async fn create_isolation_rule(
        &self,
        listener: &ListenerArn,
        target: &TargetGroupArn,
        matcher: &TestTrafficRule,
        mut in_use: Vec<u32>,
    ) -> Result<(RuleArn, u32), RuleError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let priority = next_free_priority(&in_use, matcher.priority).ok_or_else(|| {
                RuleError::RuleApplicationFailure {
                    attempts,
                    source: BalancerError::PriorityInUse(MAX_PRIORITY),
                }
            })?;
            let rule = matcher.new_rule(target, priority);

            match self.balancer.create_rule(listener, &rule).await {
                Ok(arn) => return Ok((arn, priority)),
                Err(e) if e.is_transient() && self.retry.allows_retry(attempts) => {
                    tracing::warn!("Creating test rule on {} failed, retrying: {}", listener, e);
                    tokio::time::sleep(self.retry.delay(attempts - 1)).await;
                    let balancer = self.balancer;
                    in_use = self
                        .retry
                        .run(move || balancer.describe_rules(listener))
                        .await?
                        .iter()
                        .filter(|r| !r.is_test_isolation(&matcher.header))
                        .map(|r| r.priority)
                        .collect();
                }
                Err(e) if e.is_transient() => {
                    return Err(RuleError::RuleApplicationFailure {
                        attempts,
                        source: e,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn verify_isolation(
        &self,
        listener: &ListenerArn,
        rule: &RuleArn,
        matcher: &TestTrafficRule,
    ) -> Result<(), RuleError> {
        let balancer = self.balancer;
        let rules = self
            .retry
            .run(move || balancer.describe_rules(listener))
            .await?;
        let isolation: Vec<&RuleArn> = rules
            .iter()
            .filter(|r| r.is_test_isolation(&matcher.header))
            .map(|r| &r.arn)
            .collect();

        match isolation.as_slice() {
            [only] if *only == rule => Ok(()),
            [] => Err(RuleError::Unverified(format!(
                "test rule {} missing from {}",
                rule, listener
            ))),
            _ => Err(RuleError::Unverified(format!(
                "{} test rules present on {} after creating {}",
                isolation.len(),
                listener,
                rule
            ))),
        }
    }

    /// Remove a rule created by a failed apply, returning the error to report.
    async fn compensate(&self, rule: &RuleArn, cause: RuleError) -> RuleError {
        match self.delete_rule(rule).await {
            Ok(_) => cause,
            Err(RuleError::RuleApplicationFailure { source, .. })
            | Err(RuleError::Balancer(source)) => {
                tracing::error!("Failed to remove half-applied test rule {}: {}", rule, source);
                RuleError::CompensationFailed {
                    rule: rule.clone(),
                    source,
                }
            }
            Err(other) => other,
        }
    }

    /// Delete a rule. Returns false if it was already gone.
    async fn delete_rule(&self, rule: &RuleArn) -> Result<bool, RuleError> {
        let balancer = self.balancer;
        match self.retry.run(move || balancer.delete_rule(rule)).await {
            Ok(()) => Ok(true),
            Err(Exhausted {
                last: BalancerError::RuleNotFound(_),
                ..
            }) => {
                tracing::debug!("Rule {} already removed", rule);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Classify a default action against the slot pair.
pub fn routing_of(action: &ForwardAction, pair: &SlotPair) -> Routing {
    if let Some(target) = action.sole_target() {
        return match pair.slot_of(target) {
            Some(slot) => Routing::Slot(slot),
            None => Routing::Foreign,
        };
    }
    let blue = action.weight_of(pair.get(Slot::Blue));
    let green = action.weight_of(pair.get(Slot::Green));
    if u32::from(blue) + u32::from(green) == 100 {
        Routing::Split { blue, green }
    } else {
        Routing::Foreign
    }
}

/// Lowest priority at or above `preferred` that is not taken.
fn next_free_priority(in_use: &[u32], preferred: u32) -> Option<u32> {
    (preferred.max(1)..=MAX_PRIORITY).find(|p| !in_use.contains(p))
}

fn describe(action: &ForwardAction) -> String {
    action
        .targets
        .iter()
        .map(|t| format!("{}={}%", t.target_group, t.weight))
        .collect::<Vec<_>>()
        .join(", ")
}
