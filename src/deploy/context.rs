// ABOUTME: Collaborators a deployment drives: balancer, alarms, hook registry and timing.
// ABOUTME: Also carries the cancellation signal checked between stages and during waits.

use serde::Deserialize;
use std::time::Duration;
use tokio::sync::watch;

use crate::alarms::{AlarmSource, HealthMonitor};
use crate::elb::{ListenerOps, TargetGroupOps};
use crate::hooks::HookRegistry;
use crate::retry::RetryPolicy;
use crate::rules::RuleController;

/// How long to keep polling when alarms lack data at the final increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FinalStepPolicy {
    #[serde(default = "default_unknown_retries")]
    pub unknown_retries: u32,
    #[serde(default = "default_unknown_interval", with = "humantime_serde")]
    pub unknown_interval: Duration,
}

fn default_unknown_retries() -> u32 {
    3
}

fn default_unknown_interval() -> Duration {
    Duration::from_secs(30)
}

impl Default for FinalStepPolicy {
    fn default() -> Self {
        Self {
            unknown_retries: default_unknown_retries(),
            unknown_interval: default_unknown_interval(),
        }
    }
}

/// Creates the cancellation pair for a deployment.
pub fn cancellation() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Everything a deployment needs besides its own state.
pub struct CutoverContext<'a, B, A> {
    pub balancer: &'a B,
    pub monitor: HealthMonitor<'a, A>,
    pub hooks: &'a HookRegistry<B>,
    pub retry: RetryPolicy,
    pub final_step: FinalStepPolicy,
    /// Replacement targets registered by the install step.
    pub desired_count: u32,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a, B, A> CutoverContext<'a, B, A>
where
    B: ListenerOps + TargetGroupOps + 'static,
    A: AlarmSource,
{
    pub fn new(balancer: &'a B, monitor: HealthMonitor<'a, A>, hooks: &'a HookRegistry<B>) -> Self {
        Self {
            balancer,
            monitor,
            hooks,
            retry: RetryPolicy::default(),
            final_step: FinalStepPolicy::default(),
            desired_count: 1,
            cancel: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_final_step(mut self, final_step: FinalStepPolicy) -> Self {
        self.final_step = final_step;
        self
    }

    pub fn with_desired_count(mut self, desired_count: u32) -> Self {
        self.desired_count = desired_count.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn rules(&self) -> RuleController<'a, B> {
        RuleController::new(self.balancer, self.retry)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Sleep for `duration`. Returns false if cancelled first.
    pub async fn wait(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        let deadline = tokio::time::Instant::now() + duration;
        let Some(mut rx) = self.cancel.clone() else {
            tokio::time::sleep_until(deadline).await;
            return true;
        };
        tokio::select! {
            () = tokio::time::sleep_until(deadline) => true,
            cancelled = async { rx.wait_for(|cancelled| *cancelled).await.is_ok() } => {
                if cancelled {
                    false
                } else {
                    // Sender gone; nobody can cancel any more.
                    tokio::time::sleep_until(deadline).await;
                    true
                }
            }
        }
    }
}
