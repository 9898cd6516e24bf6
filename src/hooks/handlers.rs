// ABOUTME: The explicit lifecycle hook handlers and the trait they implement.
// ABOUTME: Each handler re-reads listener state and is safe to run more than once.

use async_trait::async_trait;

use super::{HookName, HookRequest};
use crate::elb::{ListenerOps, TargetGroupOps};
use crate::retry::RetryPolicy;
use crate::rules::{RuleController, RuleError, Routing, TestTrafficRule};
use crate::types::{Slot, SlotPair};

/// Errors raised inside a handler. Never crosses the hook boundary;
/// the registry turns it into a `Failed` status.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("{0}")]
    Precondition(String),

    #[error("invalid hook request: {0}")]
    InvalidRequest(String),
}

/// What a handler may touch.
pub struct HookContext<'a, B> {
    pub balancer: &'a B,
    pub retry: RetryPolicy,
    pub test_traffic: &'a TestTrafficRule,
}

impl<'a, B: ListenerOps + TargetGroupOps> HookContext<'a, B> {
    pub fn rules(&self) -> RuleController<'a, B> {
        RuleController::new(self.balancer, self.retry)
    }
}

/// A handler for one hook point.
#[async_trait]
pub trait HookHandler<B>: Send + Sync {
    fn hook(&self) -> HookName;

    async fn handle(&self, ctx: &HookContext<'_, B>, request: &HookRequest)
    -> Result<(), HookError>;
}

/// Clears test-isolation rules left behind by a previous deployment.
pub struct BeforeInstall;

#[async_trait]
impl<B: ListenerOps + TargetGroupOps> HookHandler<B> for BeforeInstall {
    fn hook(&self) -> HookName {
        HookName::BeforeInstall
    }

    async fn handle(
        &self,
        ctx: &HookContext<'_, B>,
        request: &HookRequest,
    ) -> Result<(), HookError> {
        let rules = ctx.rules();
        let header = &ctx.test_traffic.header;
        let mut removed = 0;
        for listener in [&request.prod_listener_arn, &request.test_listener_arn] {
            removed += rules
                .clear_rules(&request.alb_arn, listener, header)
                .await?;
        }
        tracing::info!(
            "Cleared {} leftover test rule(s) before install of {}",
            removed,
            request.deployment_id
        );
        Ok(())
    }
}

/// Routes tagged requests on the test listener to the replacement slot.
pub struct AfterAllowTestTraffic;

#[async_trait]
impl<B: ListenerOps + TargetGroupOps> HookHandler<B> for AfterAllowTestTraffic {
    fn hook(&self) -> HookName {
        HookName::AfterAllowTestTraffic
    }

    async fn handle(
        &self,
        ctx: &HookContext<'_, B>,
        request: &HookRequest,
    ) -> Result<(), HookError> {
        let pair = request
            .slots()
            .map_err(|e| HookError::InvalidRequest(e.to_string()))?;
        let rules = ctx.rules();
        let replacement = replacement_slot(&rules, request, &pair).await?;
        let target = pair.get(replacement);

        if rules.registered_targets(target).await?.is_empty() {
            return Err(HookError::Precondition(format!(
                "replacement slot {replacement} ({target}) has no registered targets"
            )));
        }

        let handle = rules
            .isolate_test_traffic(
                &request.alb_arn,
                &request.test_listener_arn,
                target,
                ctx.test_traffic,
            )
            .await?;
        tracing::info!(
            "Test traffic with {} on {} routed to {} slot (rule {})",
            ctx.test_traffic.header,
            handle.listener,
            replacement,
            handle.rule
        );
        Ok(())
    }
}

/// Removes the test-isolation rule so the cutover starts from a clean listener.
pub struct BeforeAllowTraffic;

#[async_trait]
impl<B: ListenerOps + TargetGroupOps> HookHandler<B> for BeforeAllowTraffic {
    fn hook(&self) -> HookName {
        HookName::BeforeAllowTraffic
    }

    async fn handle(
        &self,
        ctx: &HookContext<'_, B>,
        request: &HookRequest,
    ) -> Result<(), HookError> {
        let rules = ctx.rules();
        let header = &ctx.test_traffic.header;
        for listener in [&request.test_listener_arn, &request.prod_listener_arn] {
            rules.clear_rules(&request.alb_arn, listener, header).await?;
            let left = rules.test_rules(&request.alb_arn, listener, header).await?;
            if !left.is_empty() {
                return Err(HookError::Precondition(format!(
                    "{} test rule(s) still present on {}",
                    left.len(),
                    listener
                )));
            }
        }
        tracing::info!("Test rules removed for {}", request.deployment_id);
        Ok(())
    }
}

/// The slot not currently serving production traffic.
async fn replacement_slot<B: ListenerOps + TargetGroupOps>(
    rules: &RuleController<'_, B>,
    request: &HookRequest,
    pair: &SlotPair,
) -> Result<Slot, HookError> {
    match rules
        .routing(&request.alb_arn, &request.prod_listener_arn, pair)
        .await?
    {
        Routing::Slot(active) => Ok(active.other()),
        Routing::Split { blue, green } => Err(HookError::Precondition(format!(
            "production traffic is split (blue {blue}%, green {green}%)"
        ))),
        Routing::Foreign => Err(HookError::Precondition(format!(
            "production listener {} forwards outside the deployment's target groups",
            request.prod_listener_arn
        ))),
    }
}
