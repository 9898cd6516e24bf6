// ABOUTME: Deployment group registrar: binds an application to its blue/green infrastructure.
// ABOUTME: Upserts are keyed by group name and never recreate an existing group.

mod error;
mod group;
mod registry;
mod traffic;

pub use error::RegistrarError;
pub use group::{
    DeploymentGroup, DeploymentGroupHandle, DeploymentGroupSpec, EcsService, GroupStore,
    UpsertOutcome,
};
pub use registry::Registrar;
pub use traffic::{DeploymentConfigName, ShiftStep, TrafficShiftPolicy, UnknownDeploymentConfig};
