// ABOUTME: Load balancer abstraction: routing model, capability traits and backends.
// ABOUTME: The orchestrator only talks to balancers through ListenerOps and TargetGroupOps.

mod error;
mod memory;
mod model;
pub(crate) mod sealed;
mod traits;

pub use error::BalancerError;
pub use memory::{BalancerState, MemoryBalancer, Operation};
pub use model::{
    ForwardAction, Listener, ListenerRule, MANAGED_TAG, NewRule, RuleCondition,
    TEST_ISOLATION_TAG, TargetGroup, WeightedTarget,
};
pub use traits::{ListenerOps, TargetGroupOps};
