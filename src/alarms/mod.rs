// ABOUTME: Health/alarm monitor consulted between traffic-shift increments.
// ABOUTME: Aggregates per-alarm state into a per-target-group status.

mod memory;
mod monitor;

pub use memory::MemoryAlarms;
pub use monitor::{AlarmBinding, AlarmReport, HealthMonitor};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::types::{AlarmName, TargetGroupArn};

/// State of a single metric alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmState {
    Ok,
    Alarm,
    InsufficientData,
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlarmState::Ok => "OK",
            AlarmState::Alarm => "ALARM",
            AlarmState::InsufficientData => "INSUFFICIENT_DATA",
        };
        f.write_str(s)
    }
}

impl FromStr for AlarmState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "ok" => Ok(AlarmState::Ok),
            "alarm" => Ok(AlarmState::Alarm),
            "insufficient-data" => Ok(AlarmState::InsufficientData),
            other => Err(format!(
                "unknown alarm state '{other}' (expected ok, alarm or insufficient-data)"
            )),
        }
    }
}

/// Health of a target group as seen through its alarms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Ok,
    Alarm,
    /// Some alarm lacks data or could not be read. Never treated as OK for the final increment.
    Unknown,
}

impl HealthStatus {
    /// Combine two statuses; ALARM dominates UNKNOWN, which dominates OK.
    pub fn worst(self, other: HealthStatus) -> HealthStatus {
        match (self, other) {
            (HealthStatus::Alarm, _) | (_, HealthStatus::Alarm) => HealthStatus::Alarm,
            (HealthStatus::Unknown, _) | (_, HealthStatus::Unknown) => HealthStatus::Unknown,
            _ => HealthStatus::Ok,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Ok => "OK",
            HealthStatus::Alarm => "ALARM",
            HealthStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A threshold alarm bound to a target group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmDefinition {
    pub name: AlarmName,
    pub target_group: TargetGroupArn,
    pub metric: String,
    pub threshold: f64,
    pub evaluation_periods: u32,
    #[serde(with = "humantime_serde")]
    pub period: Duration,
}

/// Errors reading alarm state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlarmError {
    #[error("alarm not found: {0}")]
    NotFound(String),

    #[error("alarm source unavailable: {0}")]
    Unavailable(String),
}

/// Where alarm state comes from.
#[async_trait]
pub trait AlarmSource: Send + Sync {
    async fn alarm_state(&self, alarm: &AlarmName) -> Result<AlarmState, AlarmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alarm_dominates_unknown_dominates_ok() {
        let (ok, alarm, unknown) = (HealthStatus::Ok, HealthStatus::Alarm, HealthStatus::Unknown);
        assert_eq!(ok.worst(ok), ok);
        assert_eq!(ok.worst(unknown), unknown);
        assert_eq!(unknown.worst(alarm), alarm);
        assert_eq!(alarm.worst(ok), alarm);
    }

    #[test]
    fn alarm_state_parses_cli_spellings() {
        assert_eq!("ok".parse::<AlarmState>(), Ok(AlarmState::Ok));
        assert_eq!("ALARM".parse::<AlarmState>(), Ok(AlarmState::Alarm));
        assert_eq!(
            "INSUFFICIENT_DATA".parse::<AlarmState>(),
            Ok(AlarmState::InsufficientData)
        );
        assert!("red".parse::<AlarmState>().is_err());
    }
}
