// ABOUTME: Hook dispatch keyed by hook name, with timeout and ordering checks.
// ABOUTME: Every invocation ends in a reported status; errors never escape dispatch.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;

use super::handlers::{
    AfterAllowTestTraffic, BeforeAllowTraffic, BeforeInstall, HookContext, HookHandler,
};
use super::ledger::HookLedger;
use super::{FailureReason, HookName, HookRequest, HookResponse, HookStatus};
use crate::elb::{ListenerOps, TargetGroupOps};
use crate::retry::RetryPolicy;
use crate::rules::TestTrafficRule;
use crate::types::DeploymentId;

pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Dispatches hook requests to their handlers.
pub struct HookRegistry<B> {
    handlers: BTreeMap<HookName, Box<dyn HookHandler<B>>>,
    enabled: Vec<HookName>,
    timeout: Duration,
    retry: RetryPolicy,
    test_traffic: TestTrafficRule,
    ledger: Mutex<HookLedger>,
}

impl<B: ListenerOps + TargetGroupOps + 'static> HookRegistry<B> {
    /// Empty registry; every hook is enabled but none has a handler.
    pub fn new(test_traffic: TestTrafficRule) -> Self {
        Self {
            handlers: BTreeMap::new(),
            enabled: HookName::ORDER.to_vec(),
            timeout: DEFAULT_HOOK_TIMEOUT,
            retry: RetryPolicy::default(),
            test_traffic,
            ledger: Mutex::new(HookLedger::new()),
        }
    }

    /// Registry with the three explicit handlers enabled.
    pub fn standard(test_traffic: TestTrafficRule) -> Self {
        Self::new(test_traffic)
            .register(BeforeInstall)
            .register(AfterAllowTestTraffic)
            .register(BeforeAllowTraffic)
            .with_enabled(&HookName::EXPLICIT)
    }

    pub fn register(mut self, handler: impl HookHandler<B> + 'static) -> Self {
        self.handlers.insert(handler.hook(), Box::new(handler));
        self
    }

    /// Restrict dispatch to `hooks`. Disabled hooks succeed without running.
    pub fn with_enabled(mut self, hooks: &[HookName]) -> Self {
        self.enabled = HookName::ORDER
            .into_iter()
            .filter(|h| hooks.contains(h))
            .collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_ledger(self, ledger: HookLedger) -> Self {
        *self.ledger.lock() = ledger;
        self
    }

    pub fn ledger(&self) -> HookLedger {
        self.ledger.lock().clone()
    }

    /// Whether any hook has been recorded for `deployment`.
    pub fn has_run(&self, deployment: &DeploymentId) -> bool {
        self.ledger.lock().contains(deployment)
    }

    pub fn is_enabled(&self, hook: HookName) -> bool {
        self.enabled.contains(&hook)
    }

    pub fn test_traffic(&self) -> &TestTrafficRule {
        &self.test_traffic
    }

    /// Run the handler for `request.hook_name` and report its status.
    ///
    /// A hook that already succeeded for the deployment is not run again.
    /// A hook whose enabled predecessors have not all succeeded fails with
    /// `OutOfOrder` without touching the balancer.
    pub async fn dispatch(&self, balancer: &B, request: &HookRequest) -> HookResponse {
        let hook = request.hook_name;
        let deployment_id = &request.deployment_id;

        if !self.is_enabled(hook) {
            tracing::debug!(%deployment_id, %hook, "Hook disabled, skipping");
            return HookResponse::new(request, HookStatus::Succeeded);
        }

        let precheck = {
            let ledger = self.ledger.lock();
            if ledger.succeeded(deployment_id, hook) {
                Some(HookStatus::Succeeded)
            } else {
                ledger
                    .missing_predecessor(deployment_id, hook, &self.enabled)
                    .map(|missing| HookStatus::Failed(FailureReason::OutOfOrder { hook, missing }))
            }
        };
        match precheck {
            Some(HookStatus::Succeeded) => {
                tracing::warn!(
                    %deployment_id,
                    %hook,
                    outcome = "replayed",
                    "Hook already succeeded for this deployment"
                );
                return HookResponse::new(request, HookStatus::Succeeded);
            }
            Some(status) => {
                tracing::error!(%deployment_id, %hook, outcome = "failed", "{}", status);
                return HookResponse::new(request, status);
            }
            None => {}
        }

        let status = match self.handlers.get(&hook) {
            None => HookStatus::Failed(FailureReason::NoHandler { hook }),
            Some(handler) => {
                let ctx = HookContext {
                    balancer,
                    retry: self.retry,
                    test_traffic: &self.test_traffic,
                };
                tracing::info!(%deployment_id, %hook, "Running hook");
                match tokio::time::timeout(self.timeout, handler.handle(&ctx, request)).await {
                    Ok(Ok(())) => HookStatus::Succeeded,
                    Ok(Err(e)) => HookStatus::Failed(FailureReason::from(&e)),
                    Err(_) => HookStatus::Failed(FailureReason::Timeout {
                        after: self.timeout,
                    }),
                }
            }
        };

        match &status {
            HookStatus::Succeeded => {
                tracing::info!(%deployment_id, %hook, outcome = "succeeded", "Hook completed");
            }
            HookStatus::Failed(reason) => {
                tracing::error!(%deployment_id, %hook, outcome = "failed", "Hook failed: {}", reason);
            }
        }

        self.ledger
            .lock()
            .record(deployment_id, hook, status.clone());
        HookResponse::new(request, status)
    }
}
