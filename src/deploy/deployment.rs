// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: Records the slot that served production traffic when the deployment began.

use crate::alarms::AlarmSource;
use crate::elb::{ListenerOps, TargetGroupOps};
use crate::hooks::{HookName, HookRequest};
use crate::registrar::DeploymentGroup;
use crate::rules::Routing;
use crate::types::{DeploymentId, LoadBalancerArn, Slot, TargetGroupArn};

use super::context::CutoverContext;
use super::error::DeployError;
use super::state::Initialized;

/// A deployment in progress, parameterized by its current state.
///
/// The original slot is fixed when the deployment begins; every rollback
/// returns production traffic to it.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) group: DeploymentGroup,
    pub(crate) alb: LoadBalancerArn,
    pub(crate) id: DeploymentId,
    pub(crate) original: Slot,
    pub(crate) state: S,
}

impl Deployment<Initialized> {
    /// Start a deployment of `group`, reading which slot serves production now.
    ///
    /// # Errors
    ///
    /// - `DuplicateDeployment` if hooks already ran under `id`
    /// - `ResourceNotFound` if the production listener is missing
    /// - `SplitTraffic` if production traffic is divided between the slots
    /// - `Precondition` if production forwards outside the slot pair
    pub async fn begin<B, A>(
        ctx: &CutoverContext<'_, B, A>,
        group: DeploymentGroup,
        alb: LoadBalancerArn,
        id: DeploymentId,
    ) -> Result<Self, DeployError>
    where
        B: ListenerOps + TargetGroupOps + 'static,
        A: AlarmSource,
    {
        if ctx.hooks.has_run(&id) {
            return Err(DeployError::DuplicateDeployment(id));
        }

        let routing = ctx
            .rules()
            .routing(&alb, &group.prod_listener, &group.target_groups)
            .await?;
        let original = match routing {
            Routing::Slot(slot) => slot,
            Routing::Split { blue, green } => {
                return Err(DeployError::SplitTraffic { blue, green });
            }
            Routing::Foreign => {
                return Err(DeployError::Precondition(format!(
                    "production listener {} forwards outside {}'s target groups",
                    group.prod_listener, group.name
                )));
            }
        };

        tracing::info!(
            "Deployment {} of {}: {} slot active, deploying to {}",
            id,
            group.name,
            original,
            original.other()
        );
        Ok(Deployment {
            group,
            alb,
            id,
            original,
            state: Initialized,
        })
    }
}

impl<S> Deployment<S> {
    pub fn id(&self) -> &DeploymentId {
        &self.id
    }

    pub fn group(&self) -> &DeploymentGroup {
        &self.group
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Slot serving production when the deployment began.
    pub fn original(&self) -> Slot {
        self.original
    }

    /// Slot receiving the new version.
    pub fn replacement(&self) -> Slot {
        self.original.other()
    }

    pub(crate) fn original_target(&self) -> &TargetGroupArn {
        self.group.target_groups.get(self.original)
    }

    pub(crate) fn replacement_target(&self) -> &TargetGroupArn {
        self.group.target_groups.get(self.replacement())
    }

    /// Hook request for this deployment. X is the blue slot, Y the green one.
    pub fn hook_request(&self, hook: HookName) -> HookRequest {
        HookRequest {
            hook_name: hook,
            deployment_id: self.id.clone(),
            lifecycle_event_hook_execution_id: None,
            alb_arn: self.alb.clone(),
            prod_listener_arn: self.group.prod_listener.clone(),
            test_listener_arn: self.group.test_listener.clone(),
            target_group_arn_x: self.group.target_groups.get(Slot::Blue).clone(),
            target_group_arn_y: self.group.target_groups.get(Slot::Green).clone(),
        }
    }

    pub(crate) fn transition<T>(self, state: T) -> Deployment<T> {
        Deployment {
            group: self.group,
            alb: self.alb,
            id: self.id,
            original: self.original,
            state,
        }
    }
}
