// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ARN confusion at compile time.

mod id;
mod names;
mod slot;

pub use id::{
    AlarmName, DeploymentId, Id, ListenerArn, LoadBalancerArn, RuleArn, TargetGroupArn,
};
pub use names::{ApplicationName, DeploymentGroupName, NameError};
pub use slot::{Slot, SlotPair, SlotPairError, SlotRole};
