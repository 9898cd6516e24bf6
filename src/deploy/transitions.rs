// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self and returns the next state, or itself on failure for abort().

use crate::alarms::{AlarmSource, HealthStatus};
use crate::elb::{BalancerError, ListenerOps, TargetGroupOps};
use crate::hooks::{HookName, HookStatus};
use crate::retry::RetryPolicy;
use crate::rules::{RuleController, RuleError};
use crate::types::TargetGroupArn;

use super::Deployment;
use super::context::CutoverContext;
use super::error::DeployError;
use super::state::{
    Completed, InFlight, Initialized, Installed, Prepared, RolledBack, StepReport,
    TestTrafficAllowed, TrafficReady, TrafficShifted,
};

/// Result type for transitions that may need rollback on failure.
pub type TransitionResult<T, S> = Result<Deployment<T>, (Deployment<S>, DeployError)>;

// =============================================================================
// Internal Helpers
// =============================================================================

impl<S> Deployment<S> {
    /// Dispatch `hook` and move to `next` if it succeeded.
    async fn hook_stage<T, B, A>(
        self,
        ctx: &CutoverContext<'_, B, A>,
        hook: HookName,
        next: T,
    ) -> TransitionResult<T, S>
    where
        B: ListenerOps + TargetGroupOps + 'static,
        A: AlarmSource,
    {
        if ctx.is_cancelled() {
            return Err((self, DeployError::Cancelled));
        }
        let response = ctx
            .hooks
            .dispatch(ctx.balancer, &self.hook_request(hook))
            .await;
        match response.status {
            HookStatus::Succeeded => Ok(self.transition(next)),
            HookStatus::Failed(reason) => Err((self, DeployError::HookFailed { hook, reason })),
        }
    }

    /// Deregister every target in `target_group`. Returns how many were removed.
    async fn deregister_all<B, A>(
        &self,
        ctx: &CutoverContext<'_, B, A>,
        target_group: &TargetGroupArn,
    ) -> Result<usize, DeployError>
    where
        B: ListenerOps + TargetGroupOps + 'static,
        A: AlarmSource,
    {
        let balancer = ctx.balancer;
        let current = ctx
            .retry
            .run(move || balancer.describe_target_group(target_group))
            .await
            .map_err(|e| balancer_error(e.last))?;
        if current.targets.is_empty() {
            return Ok(0);
        }
        let targets = &current.targets;
        ctx.retry
            .run(move || balancer.deregister_targets(target_group, targets))
            .await
            .map_err(|e| balancer_error(e.last))?;
        tracing::info!(
            "Deregistered {} target(s) from {}",
            current.targets.len(),
            target_group
        );
        Ok(current.targets.len())
    }
}

fn balancer_error(err: BalancerError) -> DeployError {
    if err.is_not_found() {
        DeployError::ResourceNotFound(err.to_string())
    } else {
        DeployError::Targets(err)
    }
}

// =============================================================================
// Initialized -> Prepared
// =============================================================================

impl Deployment<Initialized> {
    /// Run BeforeInstall: clear test rules left behind by an earlier deployment.
    #[must_use = "deployment state must be used"]
    pub async fn before_install<B, A>(
        self,
        ctx: &CutoverContext<'_, B, A>,
    ) -> TransitionResult<Prepared, Initialized>
    where
        B: ListenerOps + TargetGroupOps + 'static,
        A: AlarmSource,
    {
        self.hook_stage(ctx, HookName::BeforeInstall, Prepared)
            .await
    }
}

// =============================================================================
// Prepared -> Installed
// =============================================================================

impl Deployment<Prepared> {
    /// Register the new version's targets in the replacement target group.
    ///
    /// Targets left in the replacement group by an earlier deployment are
    /// deregistered first.
    #[must_use = "deployment state must be used"]
    pub async fn install<B, A>(
        self,
        ctx: &CutoverContext<'_, B, A>,
    ) -> TransitionResult<Installed, Prepared>
    where
        B: ListenerOps + TargetGroupOps + 'static,
        A: AlarmSource,
    {
        if ctx.is_cancelled() {
            return Err((self, DeployError::Cancelled));
        }
        let targets: Vec<String> = (1..=ctx.desired_count)
            .map(|n| format!("{}-{}-{}", self.group.ecs.service, self.id, n))
            .collect();
        match self.register(ctx, &targets).await {
            Ok(()) => Ok(self.transition(Installed { targets })),
            Err(e) => Err((self, e)),
        }
    }

    async fn register<B, A>(
        &self,
        ctx: &CutoverContext<'_, B, A>,
        targets: &[String],
    ) -> Result<(), DeployError>
    where
        B: ListenerOps + TargetGroupOps + 'static,
        A: AlarmSource,
    {
        let balancer = ctx.balancer;
        let target_group = self.replacement_target();
        let stale = self.deregister_all(ctx, target_group).await?;
        if stale > 0 {
            tracing::warn!(
                "Removed {} stale target(s) from replacement slot {}",
                stale,
                self.replacement()
            );
        }
        ctx.retry
            .run(move || balancer.register_targets(target_group, targets))
            .await
            .map_err(|e| balancer_error(e.last))?;
        tracing::info!(
            "Registered {} target(s) in {} slot ({})",
            targets.len(),
            self.replacement(),
            target_group
        );
        Ok(())
    }
}

// =============================================================================
// Installed -> TestTrafficAllowed -> TrafficReady
// =============================================================================

impl Deployment<Installed> {
    /// Run AfterAllowTestTraffic: route tagged requests to the replacement slot.
    #[must_use = "deployment state must be used"]
    pub async fn allow_test_traffic<B, A>(
        self,
        ctx: &CutoverContext<'_, B, A>,
    ) -> TransitionResult<TestTrafficAllowed, Installed>
    where
        B: ListenerOps + TargetGroupOps + 'static,
        A: AlarmSource,
    {
        self.hook_stage(ctx, HookName::AfterAllowTestTraffic, TestTrafficAllowed)
            .await
    }
}

impl Deployment<TestTrafficAllowed> {
    /// Run BeforeAllowTraffic: remove the test rule before production moves.
    #[must_use = "deployment state must be used"]
    pub async fn before_allow_traffic<B, A>(
        self,
        ctx: &CutoverContext<'_, B, A>,
    ) -> TransitionResult<TrafficReady, TestTrafficAllowed>
    where
        B: ListenerOps + TargetGroupOps + 'static,
        A: AlarmSource,
    {
        self.hook_stage(ctx, HookName::BeforeAllowTraffic, TrafficReady)
            .await
    }
}

// =============================================================================
// TrafficReady -> TrafficShifted
// =============================================================================

impl Deployment<TrafficReady> {
    /// Move production traffic to the replacement slot following the group's
    /// deployment config, polling alarms after every increment.
    ///
    /// Waits the group's ready wait before the first increment. A firing
    /// alarm stops the shift. At the final increment, alarms without data
    /// are polled again per the final-step policy and never count as OK.
    ///
    /// # Errors
    ///
    /// - `AlarmTriggered` if a bound alarm fires
    /// - `AlarmsUnknown` if alarms still lack data at the final increment
    /// - `Cancelled` if cancelled during a wait or between increments
    #[must_use = "deployment state must be used"]
    pub async fn shift_traffic<B, A>(
        self,
        ctx: &CutoverContext<'_, B, A>,
        mut on_step: impl FnMut(&StepReport),
    ) -> TransitionResult<TrafficShifted, TrafficReady>
    where
        B: ListenerOps + TargetGroupOps + 'static,
        A: AlarmSource,
    {
        if !self.group.ready_wait.is_zero() {
            tracing::info!(
                "Waiting {:?} before shifting traffic for {}",
                self.group.ready_wait,
                self.id
            );
        }
        if !ctx.wait(self.group.ready_wait).await {
            return Err((self, DeployError::Cancelled));
        }

        let rules = ctx.rules();
        let from = self.original_target().clone();
        let to = self.replacement_target().clone();
        let watched = [to.clone(), from.clone()];
        let steps = self.group.deployment_config.policy().steps();
        let last = steps.len().saturating_sub(1);
        let mut reports = Vec::with_capacity(steps.len());

        for (i, step) in steps.into_iter().enumerate() {
            if ctx.is_cancelled() {
                return Err((self, DeployError::Cancelled));
            }
            if let Err(e) = rules
                .shift(&self.alb, &self.group.prod_listener, &from, &to, step.percent)
                .await
            {
                return Err((self, e.into()));
            }
            tracing::info!(
                "Deployment {}: {}% of production traffic on {} slot",
                self.id,
                step.percent,
                self.replacement()
            );

            if !ctx.wait(step.bake).await {
                return Err((self, DeployError::Cancelled));
            }

            let mut report = ctx.monitor.report(&watched).await;
            if i == last {
                let mut retries = 0;
                while report.status == HealthStatus::Unknown
                    && retries < ctx.final_step.unknown_retries
                {
                    retries += 1;
                    tracing::warn!(
                        "Alarms without data at final increment ({}/{}), polling again",
                        retries,
                        ctx.final_step.unknown_retries
                    );
                    if !ctx.wait(ctx.final_step.unknown_interval).await {
                        return Err((self, DeployError::Cancelled));
                    }
                    report = ctx.monitor.report(&watched).await;
                }
            }

            let step_report = StepReport {
                percent: step.percent,
                status: report.status,
                unknown: report.unknown.clone(),
            };
            on_step(&step_report);
            reports.push(step_report);

            match report.status {
                HealthStatus::Ok => {}
                HealthStatus::Alarm => {
                    return Err((
                        self,
                        DeployError::AlarmTriggered {
                            alarms: report.firing,
                            percent: step.percent,
                        },
                    ));
                }
                HealthStatus::Unknown if i == last => {
                    return Err((
                        self,
                        DeployError::AlarmsUnknown {
                            alarms: report.unknown,
                            percent: step.percent,
                        },
                    ));
                }
                HealthStatus::Unknown => {
                    tracing::warn!(
                        "Alarm status UNKNOWN at {}% for {}, continuing",
                        step.percent,
                        self.id
                    );
                }
            }
        }

        Ok(self.transition(TrafficShifted { steps: reports }))
    }
}

// =============================================================================
// TrafficShifted -> Completed
// =============================================================================

impl Deployment<TrafficShifted> {
    /// Wait the termination wait, then deregister the outgoing slot's targets.
    #[must_use = "deployment state must be used"]
    pub async fn finish<B, A>(
        mut self,
        ctx: &CutoverContext<'_, B, A>,
    ) -> TransitionResult<Completed, TrafficShifted>
    where
        B: ListenerOps + TargetGroupOps + 'static,
        A: AlarmSource,
    {
        if !self.group.termination_wait.is_zero() {
            tracing::info!(
                "Keeping {} slot for {:?} before deregistration",
                self.original,
                self.group.termination_wait
            );
        }
        if !ctx.wait(self.group.termination_wait).await {
            return Err((self, DeployError::Cancelled));
        }

        let outgoing = self.original_target().clone();
        match self.deregister_all(ctx, &outgoing).await {
            Ok(deregistered) => {
                let steps = std::mem::take(&mut self.state.steps);
                tracing::info!(
                    "Deployment {} completed; {} slot active",
                    self.id,
                    self.replacement()
                );
                Ok(self.transition(Completed {
                    steps,
                    deregistered,
                }))
            }
            Err(e) => Err((self, e)),
        }
    }
}

// =============================================================================
// Abort (any in-flight state) -> RolledBack
// =============================================================================

impl<S: InFlight> Deployment<S> {
    /// Route all production traffic back to the original slot and remove
    /// every test-isolation rule.
    ///
    /// The revert is attempted once. Replacement targets are deregistered on
    /// a best-effort basis afterwards.
    ///
    /// # Errors
    ///
    /// `RollbackFailed` if the listener could not be reverted. Traffic may be
    /// split and needs an operator.
    pub async fn abort<B, A>(
        self,
        ctx: &CutoverContext<'_, B, A>,
        cause: &DeployError,
    ) -> Result<Deployment<RolledBack>, DeployError>
    where
        B: ListenerOps + TargetGroupOps + 'static,
        A: AlarmSource,
    {
        let reason = cause.to_string();
        tracing::warn!("Rolling back deployment {}: {}", self.id, reason);

        let rules = RuleController::new(ctx.balancer, RetryPolicy::none());
        let header = &ctx.hooks.test_traffic().header;
        let revert = async {
            rules
                .promote(&self.alb, &self.group.prod_listener, self.original_target())
                .await?;
            for listener in [&self.group.test_listener, &self.group.prod_listener] {
                rules.clear_rules(&self.alb, listener, header).await?;
            }
            Ok::<(), RuleError>(())
        };
        if let Err(source) = revert.await {
            tracing::error!(
                "Rollback of deployment {} failed, manual intervention required: {}",
                self.id,
                source
            );
            return Err(DeployError::RollbackFailed {
                cause: reason,
                source,
            });
        }

        if let Err(e) = self.deregister_all(ctx, self.replacement_target()).await {
            tracing::warn!(
                "Could not deregister replacement targets from {}: {}",
                self.replacement_target(),
                e
            );
        }

        tracing::info!(
            "Deployment {} rolled back; production on {} slot",
            self.id,
            self.original
        );
        Ok(self.transition(RolledBack { reason }))
    }
}
