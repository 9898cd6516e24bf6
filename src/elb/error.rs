// ABOUTME: Errors returned by load balancer operations.
// ABOUTME: Classifies failures as not-found, transient or permanent.

use crate::retry::Retryable;

/// Errors from listener, rule and target group operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BalancerError {
    #[error("load balancer not found: {0}")]
    LoadBalancerNotFound(String),

    #[error("listener not found: {0}")]
    ListenerNotFound(String),

    #[error("target group not found: {0}")]
    TargetGroupNotFound(String),

    #[error("rule not found: {0}")]
    RuleNotFound(String),

    #[error("rule priority {0} is already in use")]
    PriorityInUse(u32),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("load balancer error: {0}")]
    Backend(String),
}

impl BalancerError {
    /// Whether the referenced resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BalancerError::LoadBalancerNotFound(_)
                | BalancerError::ListenerNotFound(_)
                | BalancerError::TargetGroupNotFound(_)
                | BalancerError::RuleNotFound(_)
        )
    }
}

impl Retryable for BalancerError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            BalancerError::PriorityInUse(_) | BalancerError::Throttled(_)
        )
    }
}
