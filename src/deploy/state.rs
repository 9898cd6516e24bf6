// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: Each state names the last lifecycle stage that completed.

use crate::alarms::HealthStatus;
use crate::types::AlarmName;

/// Original slot identified, nothing mutated yet.
/// Available actions: `before_install()`, `abort()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Initialized;

/// Leftover test rules cleared.
/// Available actions: `install()`, `abort()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Prepared;

/// Replacement targets registered.
/// Available actions: `allow_test_traffic()`, `abort()`
#[derive(Debug, Clone, Default)]
pub struct Installed {
    pub targets: Vec<String>,
}

/// Tagged requests reach the replacement slot.
/// Available actions: `before_allow_traffic()`, `abort()`
#[derive(Debug, Clone, Copy, Default)]
pub struct TestTrafficAllowed;

/// Test rules removed, ready for the shift.
/// Available actions: `shift_traffic()`, `abort()`
#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficReady;

/// All production traffic on the replacement slot.
/// Available actions: `finish()`, `abort()`
#[derive(Debug, Clone, Default)]
pub struct TrafficShifted {
    pub steps: Vec<StepReport>,
}

/// Outgoing slot deregistered. Terminal.
#[derive(Debug, Clone, Default)]
pub struct Completed {
    pub steps: Vec<StepReport>,
    pub deregistered: usize,
}

/// Production traffic restored to the original slot. Terminal.
#[derive(Debug, Clone, Default)]
pub struct RolledBack {
    pub reason: String,
}

/// Health observed after one traffic-shift increment.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub percent: u8,
    pub status: HealthStatus,
    /// Alarms without data at this step.
    pub unknown: Vec<AlarmName>,
}

mod sealed {
    pub trait Sealed {}
}

/// States a deployment can be aborted from.
pub trait InFlight: sealed::Sealed {}

macro_rules! in_flight {
    ($($state:ty),*) => {
        $(
            impl sealed::Sealed for $state {}
            impl InFlight for $state {}
        )*
    };
}

in_flight!(
    Initialized,
    Prepared,
    Installed,
    TestTrafficAllowed,
    TrafficReady,
    TrafficShifted
);
