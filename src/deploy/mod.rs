// ABOUTME: Cutover state machine using the type state pattern.
// ABOUTME: Drives hooks, traffic shifting, alarm checks and rollback for one deployment.

mod context;
mod deployment;
mod driver;
mod error;
mod rollback;
mod state;
mod transitions;

pub use context::{CutoverContext, FinalStepPolicy, cancellation};
pub use deployment::Deployment;
pub use driver::{CutoverReporter, Stage, run_deployment};
pub use error::{DeployError, DeployErrorKind};
pub use rollback::manual_rollback;
pub use state::{
    Completed, InFlight, Initialized, Installed, Prepared, RolledBack, StepReport,
    TestTrafficAllowed, TrafficReady, TrafficShifted,
};
pub use transitions::TransitionResult;
