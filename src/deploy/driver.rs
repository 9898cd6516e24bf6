// ABOUTME: Drives a deployment through every lifecycle stage the way the deployment process does.
// ABOUTME: Reports each stage outcome and rolls back on failure, alarm or cancellation.

use std::fmt;

use crate::alarms::AlarmSource;
use crate::elb::{ListenerOps, TargetGroupOps};
use crate::registrar::DeploymentGroup;
use crate::types::{DeploymentId, LoadBalancerArn};

use super::Deployment;
use super::context::CutoverContext;
use super::error::DeployError;
use super::state::{Completed, InFlight, StepReport};

/// Lifecycle stages reported while a deployment runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Begin,
    BeforeInstall,
    Install,
    AfterAllowTestTraffic,
    BeforeAllowTraffic,
    ShiftTraffic,
    Finish,
    Rollback,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Begin => "Begin",
            Stage::BeforeInstall => "BeforeInstall",
            Stage::Install => "Install",
            Stage::AfterAllowTestTraffic => "AfterAllowTestTraffic",
            Stage::BeforeAllowTraffic => "BeforeAllowTraffic",
            Stage::ShiftTraffic => "ShiftTraffic",
            Stage::Finish => "Finish",
            Stage::Rollback => "Rollback",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Receives stage outcomes as a deployment runs.
pub trait CutoverReporter {
    fn stage(&mut self, deployment: &DeploymentId, stage: Stage, outcome: &str);

    fn step(&mut self, deployment: &DeploymentId, step: &StepReport) {
        let _ = (deployment, step);
    }
}

/// Run a complete deployment of `group`.
///
/// Any failure after BeforeInstall rolls production back to the original
/// slot. A failure in BeforeInstall halts without compensation.
///
/// # Errors
///
/// The error that stopped the deployment, or `RollbackFailed` if the
/// compensating rollback itself failed.
pub async fn run_deployment<B, A>(
    ctx: &CutoverContext<'_, B, A>,
    group: DeploymentGroup,
    alb: LoadBalancerArn,
    id: DeploymentId,
    reporter: &mut dyn CutoverReporter,
) -> Result<Deployment<Completed>, DeployError>
where
    B: ListenerOps + TargetGroupOps + 'static,
    A: AlarmSource,
{
    let deployment = match Deployment::begin(ctx, group, alb, id.clone()).await {
        Ok(d) => {
            let outcome = format!("{} -> {}", d.original(), d.replacement());
            reporter.stage(&id, Stage::Begin, &outcome);
            d
        }
        Err(e) => {
            reporter.stage(&id, Stage::Begin, &format!("failed: {e}"));
            return Err(e);
        }
    };

    let deployment = match deployment.before_install(ctx).await {
        Ok(d) => {
            reporter.stage(&id, Stage::BeforeInstall, "succeeded");
            d
        }
        Err((_, e)) => {
            reporter.stage(&id, Stage::BeforeInstall, &format!("failed: {e}"));
            return Err(e);
        }
    };

    let deployment = match deployment.install(ctx).await {
        Ok(d) => {
            let outcome = format!("{} target(s) registered", d.state().targets.len());
            reporter.stage(&id, Stage::Install, &outcome);
            d
        }
        Err((d, e)) => return Err(fail(ctx, d, e, Stage::Install, reporter).await),
    };

    let deployment = match deployment.allow_test_traffic(ctx).await {
        Ok(d) => {
            reporter.stage(&id, Stage::AfterAllowTestTraffic, "succeeded");
            d
        }
        Err((d, e)) => return Err(fail(ctx, d, e, Stage::AfterAllowTestTraffic, reporter).await),
    };

    let deployment = match deployment.before_allow_traffic(ctx).await {
        Ok(d) => {
            reporter.stage(&id, Stage::BeforeAllowTraffic, "succeeded");
            d
        }
        Err((d, e)) => return Err(fail(ctx, d, e, Stage::BeforeAllowTraffic, reporter).await),
    };

    let shifted = deployment
        .shift_traffic(ctx, |step| reporter.step(&id, step))
        .await;
    let deployment = match shifted {
        Ok(d) => {
            reporter.stage(&id, Stage::ShiftTraffic, "100% shifted");
            d
        }
        Err((d, e)) => return Err(fail(ctx, d, e, Stage::ShiftTraffic, reporter).await),
    };

    match deployment.finish(ctx).await {
        Ok(d) => {
            let outcome = format!(
                "{} slot active, {} target(s) deregistered",
                d.replacement(),
                d.state().deregistered
            );
            reporter.stage(&id, Stage::Finish, &outcome);
            Ok(d)
        }
        Err((d, e)) => Err(fail(ctx, d, e, Stage::Finish, reporter).await),
    }
}

/// Report a failed stage and roll back. Returns the error to surface.
async fn fail<S, B, A>(
    ctx: &CutoverContext<'_, B, A>,
    deployment: Deployment<S>,
    error: DeployError,
    stage: Stage,
    reporter: &mut dyn CutoverReporter,
) -> DeployError
where
    S: InFlight,
    B: ListenerOps + TargetGroupOps + 'static,
    A: AlarmSource,
{
    let id = deployment.id().clone();
    reporter.stage(&id, stage, &format!("failed: {error}"));
    match deployment.abort(ctx, &error).await {
        Ok(rolled_back) => {
            let outcome = format!("production restored to {} slot", rolled_back.original());
            reporter.stage(&id, Stage::Rollback, &outcome);
            error
        }
        Err(rollback_error) => {
            reporter.stage(&id, Stage::Rollback, &format!("failed: {rollback_error}"));
            rollback_error
        }
    }
}
