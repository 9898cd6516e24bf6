// ABOUTME: Listener rule controller for test isolation and production cutover.
// ABOUTME: Wraps balancer calls with retries, read-back verification and compensation.

mod controller;
mod error;
mod matcher;

pub use controller::{RuleController, RuleHandle, Routing, routing_of};
pub use error::RuleError;
pub use matcher::TestTrafficRule;
