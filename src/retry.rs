// ABOUTME: Bounded retry with exponential backoff for transient balancer failures.
// ABOUTME: Errors opt in to retrying by implementing Retryable.

use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

/// Classifies an error as worth retrying.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// An operation that kept failing until its attempts ran out.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last: E,
}

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Coefficient to multiply initial_interval with for every past attempt.
    #[serde(default = "default_backoff_coefficient")]
    pub backoff_coefficient: u32,
    /// The backoff interval for the first retry.
    #[serde(default = "default_initial_interval", with = "humantime_serde")]
    pub initial_interval: Duration,
    /// The maximum possible backoff between retries.
    #[serde(default = "default_max_interval", with = "humantime_serde")]
    pub max_interval: Option<Duration>,
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_coefficient() -> u32 {
    2
}

fn default_initial_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_max_interval() -> Option<Duration> {
    Some(Duration::from_secs(5))
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff_coefficient: default_backoff_coefficient(),
            initial_interval: default_initial_interval(),
            max_interval: default_max_interval(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before retry number `attempt` (0 for the first retry).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.backoff_coefficient.saturating_pow(attempt);
        let candidate = self.initial_interval.saturating_mul(factor);
        match self.max_interval {
            Some(max) => candidate.min(max),
            None => candidate,
        }
    }

    /// Whether another attempt is allowed after `attempts_made` attempts.
    pub fn allows_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.attempts.max(1)
    }

    /// Run `op` until it succeeds, fails permanently or runs out of attempts.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, Exhausted<E>>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && self.allows_retry(attempts) => {
                    let wait = self.delay(attempts - 1);
                    tracing::debug!(
                        "Transient failure (attempt {}/{}), retrying in {:?}: {}",
                        attempts,
                        self.attempts,
                        wait,
                        e
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(last) => return Err(Exhausted { attempts, last }),
            }
        }
    }
}
