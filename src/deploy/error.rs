// ABOUTME: Error types for the cutover state machine.
// ABOUTME: Distinguishes rollback triggers from failures that need an operator.

use crate::elb::BalancerError;
use crate::hooks::{FailureReason, HookName};
use crate::rules::RuleError;
use crate::types::{AlarmName, DeploymentId};

/// Broad classification of deployment errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    /// A referenced listener, target group or alarm is missing.
    NotFound,
    /// Balancer state does not allow the requested step.
    Precondition,
    /// A lifecycle hook reported failure.
    Hook,
    /// Applying a routing change failed.
    Routing,
    /// A bound alarm fired during the traffic shift.
    AlarmTriggered,
    /// Alarms stayed without data at the final increment.
    AlarmsUnknown,
    /// The operator stopped the deployment.
    Cancelled,
    /// Automated recovery failed; traffic must be fixed by hand.
    ManualIntervention,
}

/// Errors from deployment state transitions.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Production traffic is divided between the slots, so there is no last-known-good slot.
    #[error("production traffic is split (blue {blue}%, green {green}%)")]
    SplitTraffic { blue: u8, green: u8 },

    #[error("{hook} failed: {reason}")]
    HookFailed { hook: HookName, reason: FailureReason },

    #[error("routing change failed: {0}")]
    Rule(RuleError),

    #[error("target registration failed: {0}")]
    Targets(#[from] BalancerError),

    #[error("alarm triggered at {percent}% shifted: {}", join(.alarms))]
    AlarmTriggered { alarms: Vec<AlarmName>, percent: u8 },

    #[error("alarms without data at the final increment: {}", join(.alarms))]
    AlarmsUnknown { alarms: Vec<AlarmName>, percent: u8 },

    #[error("deployment cancelled")]
    Cancelled,

    #[error("deployment {0} already ran; start a new deployment with a fresh id")]
    DuplicateDeployment(DeploymentId),

    #[error("no previous deployment to roll back to: {0}")]
    NoPreviousDeployment(String),

    /// Reverting the production listener failed. Never retried automatically.
    #[error("rollback failed after '{cause}', manual intervention required: {source}")]
    RollbackFailed {
        cause: String,
        #[source]
        source: RuleError,
    },
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::ResourceNotFound(_) => DeployErrorKind::NotFound,
            DeployError::Precondition(_)
            | DeployError::SplitTraffic { .. }
            | DeployError::DuplicateDeployment(_)
            | DeployError::NoPreviousDeployment(_) => DeployErrorKind::Precondition,
            DeployError::HookFailed { .. } => DeployErrorKind::Hook,
            DeployError::Rule(_) | DeployError::Targets(_) => DeployErrorKind::Routing,
            DeployError::AlarmTriggered { .. } => DeployErrorKind::AlarmTriggered,
            DeployError::AlarmsUnknown { .. } => DeployErrorKind::AlarmsUnknown,
            DeployError::Cancelled => DeployErrorKind::Cancelled,
            DeployError::RollbackFailed { .. } => DeployErrorKind::ManualIntervention,
        }
    }
}

impl From<RuleError> for DeployError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::ResourceNotFound(what) => DeployError::ResourceNotFound(what),
            other => DeployError::Rule(other),
        }
    }
}

fn join(alarms: &[AlarmName]) -> String {
    alarms
        .iter()
        .map(AlarmName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
