// ABOUTME: Error types for listener rule manipulation.
// ABOUTME: Separates missing resources, exhausted retries and unverified state.

use crate::elb::BalancerError;
use crate::retry::{Exhausted, Retryable};
use crate::types::RuleArn;

/// Errors from the listener rule controller.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// A listener, target group or rule referenced by the request doesn't exist.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// A transient failure persisted past the retry budget.
    #[error("rule application failed after {attempts} attempt(s): {source}")]
    RuleApplicationFailure {
        attempts: u32,
        #[source]
        source: BalancerError,
    },

    /// The listener did not read back in the state that was just written.
    #[error("listener state not converged: {0}")]
    Unverified(String),

    /// A rule was created but could not be removed again after a later failure.
    #[error("rule {rule} was left behind after a failed apply: {source}")]
    CompensationFailed {
        rule: RuleArn,
        #[source]
        source: BalancerError,
    },

    /// Permanent balancer failure.
    #[error(transparent)]
    Balancer(BalancerError),
}

impl RuleError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuleError::ResourceNotFound(_))
    }
}

impl From<BalancerError> for RuleError {
    fn from(err: BalancerError) -> Self {
        if err.is_not_found() {
            RuleError::ResourceNotFound(err.to_string())
        } else if err.is_transient() {
            RuleError::RuleApplicationFailure {
                attempts: 1,
                source: err,
            }
        } else {
            RuleError::Balancer(err)
        }
    }
}

impl From<Exhausted<BalancerError>> for RuleError {
    fn from(err: Exhausted<BalancerError>) -> Self {
        if err.last.is_transient() {
            RuleError::RuleApplicationFailure {
                attempts: err.attempts,
                source: err.last,
            }
        } else {
            RuleError::from(err.last)
        }
    }
}
