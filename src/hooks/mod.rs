// ABOUTME: Lifecycle hooks invoked by the deployment process at fixed points of a cutover.
// ABOUTME: Defines hook names, the request/response contract and failure reasons.

mod handlers;
mod ledger;
mod registry;

pub use handlers::{
    AfterAllowTestTraffic, BeforeAllowTraffic, BeforeInstall, HookContext, HookError,
    HookHandler,
};
pub use ledger::{HookLedger, HookRecord};
pub use registry::{DEFAULT_HOOK_TIMEOUT, HookRegistry};

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::rules::RuleError;
use crate::types::{
    DeploymentId, ListenerArn, LoadBalancerArn, SlotPair, SlotPairError, TargetGroupArn,
};

/// Hook points of a blue/green deployment, in invocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HookName {
    BeforeInstall,
    /// Owned by the deployment process; no handler.
    AfterInstall,
    AfterAllowTestTraffic,
    BeforeAllowTraffic,
    /// Owned by the deployment process; no handler.
    AfterAllowTraffic,
}

impl HookName {
    pub const ORDER: [HookName; 5] = [
        HookName::BeforeInstall,
        HookName::AfterInstall,
        HookName::AfterAllowTestTraffic,
        HookName::BeforeAllowTraffic,
        HookName::AfterAllowTraffic,
    ];

    /// Hooks with a handler in the standard registry.
    pub const EXPLICIT: [HookName; 3] = [
        HookName::BeforeInstall,
        HookName::AfterAllowTestTraffic,
        HookName::BeforeAllowTraffic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HookName::BeforeInstall => "BeforeInstall",
            HookName::AfterInstall => "AfterInstall",
            HookName::AfterAllowTestTraffic => "AfterAllowTestTraffic",
            HookName::BeforeAllowTraffic => "BeforeAllowTraffic",
            HookName::AfterAllowTraffic => "AfterAllowTraffic",
        }
    }

    /// Hooks that run before this one.
    pub fn predecessors(self) -> impl Iterator<Item = HookName> {
        HookName::ORDER.into_iter().take_while(move |h| *h != self)
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookName {
    type Err = String;

    /// Case-insensitive; dashes and underscores are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        HookName::ORDER
            .into_iter()
            .find(|h| h.as_str().to_ascii_lowercase() == wanted)
            .ok_or_else(|| format!("unknown hook '{s}'"))
    }
}

/// A hook invocation from the deployment process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookRequest {
    pub hook_name: HookName,
    pub deployment_id: DeploymentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_event_hook_execution_id: Option<String>,
    pub alb_arn: LoadBalancerArn,
    pub prod_listener_arn: ListenerArn,
    pub test_listener_arn: ListenerArn,
    /// Blue slot.
    pub target_group_arn_x: TargetGroupArn,
    /// Green slot.
    pub target_group_arn_y: TargetGroupArn,
}

impl HookRequest {
    pub fn slots(&self) -> Result<SlotPair, SlotPairError> {
        SlotPair::new(
            self.target_group_arn_x.clone(),
            self.target_group_arn_y.clone(),
        )
    }
}

/// Why a hook reported failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("timed out after {after:?}")]
    Timeout {
        #[serde(with = "humantime_serde")]
        after: Duration,
    },

    #[error("resource not found: {message}")]
    ResourceNotFound { message: String },

    #[error("rule application failed: {message}")]
    RuleApplication { message: String },

    #[error("{hook} invoked before {missing} succeeded")]
    OutOfOrder { hook: HookName, missing: HookName },

    #[error("precondition failed: {message}")]
    Precondition { message: String },

    #[error("no handler registered for {hook}")]
    NoHandler { hook: HookName },

    #[error("{message}")]
    Handler { message: String },
}

impl From<&HookError> for FailureReason {
    fn from(err: &HookError) -> Self {
        let message = err.to_string();
        match err {
            HookError::Rule(RuleError::ResourceNotFound(_)) => {
                FailureReason::ResourceNotFound { message }
            }
            HookError::Rule(RuleError::RuleApplicationFailure { .. }) => {
                FailureReason::RuleApplication { message }
            }
            HookError::Precondition(_) | HookError::InvalidRequest(_) => {
                FailureReason::Precondition { message }
            }
            HookError::Rule(_) => FailureReason::Handler { message },
        }
    }
}

/// Outcome of one hook invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason")]
pub enum HookStatus {
    Succeeded,
    Failed(FailureReason),
}

impl HookStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, HookStatus::Succeeded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookStatus::Succeeded => "Succeeded",
            HookStatus::Failed(_) => "Failed",
        }
    }
}

impl fmt::Display for HookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookStatus::Succeeded => f.write_str("Succeeded"),
            HookStatus::Failed(reason) => write!(f, "Failed({reason})"),
        }
    }
}

/// Status reported back to the deployment process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookResponse {
    pub deployment_id: DeploymentId,
    pub lifecycle_event_hook_execution_id: Option<String>,
    pub hook_name: HookName,
    pub status: HookStatus,
}

impl HookResponse {
    pub fn new(request: &HookRequest, status: HookStatus) -> Self {
        Self {
            deployment_id: request.deployment_id.clone(),
            lifecycle_event_hook_execution_id: request.lifecycle_event_hook_execution_id.clone(),
            hook_name: request.hook_name,
            status,
        }
    }
}

impl Serialize for HookResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let reason = match &self.status {
            HookStatus::Succeeded => None,
            HookStatus::Failed(reason) => Some(reason),
        };
        let mut state = serializer.serialize_struct("HookResponse", 5)?;
        state.serialize_field("deploymentId", &self.deployment_id)?;
        if let Some(id) = &self.lifecycle_event_hook_execution_id {
            state.serialize_field("lifecycleEventHookExecutionId", id)?;
        } else {
            state.skip_field("lifecycleEventHookExecutionId")?;
        }
        state.serialize_field("hookName", &self.hook_name)?;
        state.serialize_field("status", self.status.as_str())?;
        if let Some(reason) = reason {
            state.serialize_field("reason", &reason.to_string())?;
        } else {
            state.skip_field("reason")?;
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> HookRequest {
        serde_json::from_value(serde_json::json!({
            "hookName": "AfterAllowTestTraffic",
            "deploymentId": "d-ABC123",
            "albArn": "alb/books",
            "prodListenerArn": "listener/prod",
            "testListenerArn": "listener/test",
            "targetGroupArnX": "tg/blue",
            "targetGroupArnY": "tg/green"
        }))
        .unwrap()
    }

    #[test]
    fn hook_names_parse_loosely() {
        assert_eq!(
            "before-allow-traffic".parse::<HookName>().unwrap(),
            HookName::BeforeAllowTraffic
        );
        assert_eq!(
            "BeforeInstall".parse::<HookName>().unwrap(),
            HookName::BeforeInstall
        );
        assert!("AfterEverything".parse::<HookName>().is_err());
    }

    #[test]
    fn predecessors_follow_invocation_order() {
        let before: Vec<HookName> = HookName::BeforeAllowTraffic.predecessors().collect();
        assert_eq!(
            before,
            vec![
                HookName::BeforeInstall,
                HookName::AfterInstall,
                HookName::AfterAllowTestTraffic
            ]
        );
        assert_eq!(HookName::BeforeInstall.predecessors().count(), 0);
    }

    #[test]
    fn request_maps_x_to_blue_and_y_to_green() {
        let request = request();
        let slots = request.slots().unwrap();
        assert_eq!(slots.get(crate::types::Slot::Blue).as_str(), "tg/blue");
        assert_eq!(slots.get(crate::types::Slot::Green).as_str(), "tg/green");
        assert_eq!(request.lifecycle_event_hook_execution_id, None);
    }

    #[test]
    fn failed_response_carries_reason() {
        let response = HookResponse::new(
            &request(),
            HookStatus::Failed(FailureReason::Timeout {
                after: Duration::from_secs(30),
            }),
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "Failed");
        assert_eq!(json["hookName"], "AfterAllowTestTraffic");
        assert_eq!(json["reason"], "timed out after 30s");
        assert!(json.get("lifecycleEventHookExecutionId").is_none());
    }

    #[test]
    fn succeeded_response_has_no_reason() {
        let mut request = request();
        request.lifecycle_event_hook_execution_id = Some("exec-1".into());
        let json = serde_json::to_value(HookResponse::new(&request, HookStatus::Succeeded)).unwrap();
        assert_eq!(json["status"], "Succeeded");
        assert_eq!(json["lifecycleEventHookExecutionId"], "exec-1");
        assert!(json.get("reason").is_none());
    }
}
