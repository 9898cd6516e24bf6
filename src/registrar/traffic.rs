// ABOUTME: Deployment config names and the traffic-shift schedules they select.
// ABOUTME: Only the closed set of ECS blue/green configs is accepted.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The closed set of deployment configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeploymentConfigName {
    AllAtOnce,
    Linear10PercentEvery1Minutes,
    Linear10PercentEvery3Minutes,
    Canary10Percent5Minutes,
    Canary10Percent15Minutes,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown deployment config: {0}")]
pub struct UnknownDeploymentConfig(pub String);

impl DeploymentConfigName {
    pub const ALL: [DeploymentConfigName; 5] = [
        DeploymentConfigName::AllAtOnce,
        DeploymentConfigName::Linear10PercentEvery1Minutes,
        DeploymentConfigName::Linear10PercentEvery3Minutes,
        DeploymentConfigName::Canary10Percent5Minutes,
        DeploymentConfigName::Canary10Percent15Minutes,
    ];

    /// Canonical name as used by the deployment service.
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentConfigName::AllAtOnce => "CodeDeployDefault.ECSAllAtOnce",
            DeploymentConfigName::Linear10PercentEvery1Minutes => {
                "CodeDeployDefault.ECSLinear10PercentEvery1Minutes"
            }
            DeploymentConfigName::Linear10PercentEvery3Minutes => {
                "CodeDeployDefault.ECSLinear10PercentEvery3Minutes"
            }
            DeploymentConfigName::Canary10Percent5Minutes => {
                "CodeDeployDefault.ECSCanary10Percent5Minutes"
            }
            DeploymentConfigName::Canary10Percent15Minutes => {
                "CodeDeployDefault.ECSCanary10Percent15Minutes"
            }
        }
    }

    /// The schedule this config shifts traffic with.
    pub fn policy(self) -> TrafficShiftPolicy {
        const MINUTE: Duration = Duration::from_secs(60);
        match self {
            DeploymentConfigName::AllAtOnce => TrafficShiftPolicy::AllAtOnce,
            DeploymentConfigName::Linear10PercentEvery1Minutes => TrafficShiftPolicy::Linear {
                percent: 10,
                interval: MINUTE,
            },
            DeploymentConfigName::Linear10PercentEvery3Minutes => TrafficShiftPolicy::Linear {
                percent: 10,
                interval: MINUTE * 3,
            },
            DeploymentConfigName::Canary10Percent5Minutes => TrafficShiftPolicy::Canary {
                percent: 10,
                interval: MINUTE * 5,
            },
            DeploymentConfigName::Canary10Percent15Minutes => TrafficShiftPolicy::Canary {
                percent: 10,
                interval: MINUTE * 15,
            },
        }
    }
}

impl FromStr for DeploymentConfigName {
    type Err = UnknownDeploymentConfig;

    /// Accepts names with or without the `CodeDeployDefault.` prefix,
    /// the `ECS` marker and the plural `Minutes`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let short = s.trim();
        let short = short.strip_prefix("CodeDeployDefault.").unwrap_or(short);
        let short = short.strip_prefix("ECS").unwrap_or(short);
        let name = match short {
            "AllAtOnce" => DeploymentConfigName::AllAtOnce,
            "Linear10PercentEvery1Minute" | "Linear10PercentEvery1Minutes" => {
                DeploymentConfigName::Linear10PercentEvery1Minutes
            }
            "Linear10PercentEvery3Minute" | "Linear10PercentEvery3Minutes" => {
                DeploymentConfigName::Linear10PercentEvery3Minutes
            }
            "Canary10Percent5Minute" | "Canary10Percent5Minutes" => {
                DeploymentConfigName::Canary10Percent5Minutes
            }
            "Canary10Percent15Minute" | "Canary10Percent15Minutes" => {
                DeploymentConfigName::Canary10Percent15Minutes
            }
            _ => return Err(UnknownDeploymentConfig(s.to_string())),
        };
        Ok(name)
    }
}

impl fmt::Display for DeploymentConfigName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DeploymentConfigName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeploymentConfigName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// How production traffic moves from the original to the replacement slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficShiftPolicy {
    /// Everything at once.
    AllAtOnce,
    /// `percent` more every `interval` until 100.
    Linear { percent: u8, interval: Duration },
    /// `percent` first, the remainder after `interval`.
    Canary { percent: u8, interval: Duration },
}

/// One increment of a traffic shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftStep {
    /// Cumulative share of production traffic on the replacement slot.
    pub percent: u8,
    /// How long the step bakes before alarms are polled.
    pub bake: Duration,
}

impl TrafficShiftPolicy {
    /// The increments of this policy. The last step is always 100% with no bake.
    pub fn steps(&self) -> Vec<ShiftStep> {
        let final_step = ShiftStep {
            percent: 100,
            bake: Duration::ZERO,
        };
        match *self {
            TrafficShiftPolicy::AllAtOnce => vec![final_step],
            TrafficShiftPolicy::Linear { percent, interval } => {
                let increment = percent.clamp(1, 100);
                let mut steps: Vec<ShiftStep> = (1..)
                    .map(|i: u32| u32::from(increment) * i)
                    .take_while(|p| *p < 100)
                    .map(|p| ShiftStep {
                        percent: p as u8,
                        bake: interval,
                    })
                    .collect();
                steps.push(final_step);
                steps
            }
            TrafficShiftPolicy::Canary { percent, interval } => {
                if percent == 0 || percent >= 100 {
                    return vec![final_step];
                }
                vec![
                    ShiftStep {
                        percent,
                        bake: interval,
                    },
                    final_step,
                ]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_forms() {
        for name in DeploymentConfigName::ALL {
            assert_eq!(name.as_str().parse::<DeploymentConfigName>().unwrap(), name);
        }
        assert_eq!(
            "ECSLinear10PercentEvery1Minute"
                .parse::<DeploymentConfigName>()
                .unwrap(),
            DeploymentConfigName::Linear10PercentEvery1Minutes
        );
        assert_eq!(
            "AllAtOnce".parse::<DeploymentConfigName>().unwrap(),
            DeploymentConfigName::AllAtOnce
        );
    }

    #[test]
    fn rejects_names_outside_the_closed_set() {
        assert!("CodeDeployDefault.OneAtATime".parse::<DeploymentConfigName>().is_err());
        assert!("Linear20PercentEvery1Minutes".parse::<DeploymentConfigName>().is_err());
        assert!("AllAtOnces".parse::<DeploymentConfigName>().is_err());
        assert!("ECSCanary10Percent5Minutess".parse::<DeploymentConfigName>().is_err());
    }

    #[test]
    fn linear_ten_percent_has_ten_steps() {
        let steps = DeploymentConfigName::Linear10PercentEvery1Minutes
            .policy()
            .steps();
        let percents: Vec<u8> = steps.iter().map(|s| s.percent).collect();
        assert_eq!(percents, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
        assert!(steps[..9].iter().all(|s| s.bake == Duration::from_secs(60)));
        assert_eq!(steps[9].bake, Duration::ZERO);
    }

    #[test]
    fn canary_has_two_steps() {
        let steps = DeploymentConfigName::Canary10Percent5Minutes.policy().steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].percent, 10);
        assert_eq!(steps[0].bake, Duration::from_secs(300));
        assert_eq!(steps[1].percent, 100);
    }

    #[test]
    fn all_at_once_is_a_single_step() {
        let steps = TrafficShiftPolicy::AllAtOnce.steps();
        assert_eq!(steps, vec![ShiftStep { percent: 100, bake: Duration::ZERO }]);
    }

    #[test]
    fn uneven_linear_increments_end_at_one_hundred() {
        let steps = TrafficShiftPolicy::Linear {
            percent: 30,
            interval: Duration::from_secs(1),
        }
        .steps();
        let percents: Vec<u8> = steps.iter().map(|s| s.percent).collect();
        assert_eq!(percents, vec![30, 60, 90, 100]);
    }
}
