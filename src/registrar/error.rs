// ABOUTME: Error types for deployment group registration.
// ABOUTME: Conflicts and invalid configs are fatal and surfaced to the operator.

use crate::alarms::AlarmError;
use crate::elb::BalancerError;
use crate::types::DeploymentGroupName;

#[derive(Debug, thiserror::Error)]
pub enum RegistrarError {
    #[error("invalid deployment group config: {0}")]
    InvalidConfig(String),

    /// Structural identity of an existing group differs from the request.
    #[error("registration conflict for deployment group '{name}': {reason}")]
    Conflict {
        name: DeploymentGroupName,
        reason: String,
    },

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error(transparent)]
    Balancer(#[from] BalancerError),

    #[error(transparent)]
    Alarm(AlarmError),
}

impl RegistrarError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RegistrarError::Conflict { .. })
    }
}
