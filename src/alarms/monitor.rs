// ABOUTME: Read-only view of target group health derived from bound alarms.
// ABOUTME: Polls every relevant alarm and folds the results into one status.

use futures::future::join_all;

use super::{AlarmDefinition, AlarmSource, AlarmState, HealthStatus};
use crate::registrar::DeploymentGroup;
use crate::types::{AlarmName, TargetGroupArn};

/// Result of polling a set of alarms.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmReport {
    pub status: HealthStatus,
    /// Alarms currently in ALARM.
    pub firing: Vec<AlarmName>,
    /// Alarms without data or that could not be read.
    pub unknown: Vec<AlarmName>,
}

/// An alarm and the target group it watches.
///
/// An alarm without a target group is polled for every report and never
/// counts as OK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmBinding {
    pub name: AlarmName,
    pub target_group: Option<TargetGroupArn>,
}

impl From<AlarmDefinition> for AlarmBinding {
    fn from(definition: AlarmDefinition) -> Self {
        Self {
            name: definition.name,
            target_group: Some(definition.target_group),
        }
    }
}

/// Surfaces per-target-group alarm state.
pub struct HealthMonitor<'a, A> {
    source: &'a A,
    alarms: Vec<AlarmBinding>,
}

impl<'a, A: AlarmSource> HealthMonitor<'a, A> {
    pub fn new(source: &'a A, alarms: Vec<AlarmDefinition>) -> Self {
        Self {
            source,
            alarms: alarms.into_iter().map(AlarmBinding::from).collect(),
        }
    }

    /// Watch the rollback alarms registered on `group`, bound to the slots
    /// the group recorded for them.
    pub fn for_group(source: &'a A, group: &DeploymentGroup) -> Self {
        let alarms = group
            .alarms
            .iter()
            .map(|name| {
                let target_group = group.alarm_target(name).cloned();
                if target_group.is_none() {
                    tracing::warn!("Alarm {} has no slot binding on {}", name, group.name);
                }
                AlarmBinding {
                    name: name.clone(),
                    target_group,
                }
            })
            .collect();
        Self { source, alarms }
    }

    /// Only watch the named alarms, e.g. the rollback set of a deployment group.
    pub fn restricted_to(mut self, names: &[AlarmName]) -> Self {
        self.alarms.retain(|a| names.contains(&a.name));
        self
    }

    pub fn alarms(&self) -> &[AlarmBinding] {
        &self.alarms
    }

    /// Status of one target group. OK when no alarm is bound to it.
    pub async fn status(&self, target_group: &TargetGroupArn) -> HealthStatus {
        self.report(std::slice::from_ref(target_group)).await.status
    }

    /// Poll every alarm bound to any of `target_groups`, plus unbound alarms.
    pub async fn report(&self, target_groups: &[TargetGroupArn]) -> AlarmReport {
        let watched: Vec<&AlarmBinding> = self
            .alarms
            .iter()
            .filter(|a| {
                a.target_group
                    .as_ref()
                    .is_none_or(|tg| target_groups.contains(tg))
            })
            .collect();

        let results = join_all(watched.iter().map(|a| self.source.alarm_state(&a.name))).await;

        let mut report = AlarmReport {
            status: HealthStatus::Ok,
            firing: Vec::new(),
            unknown: Vec::new(),
        };
        for (alarm, result) in watched.into_iter().zip(results) {
            match (result, &alarm.target_group) {
                (Ok(AlarmState::Alarm), target_group) => {
                    match target_group {
                        Some(tg) => tracing::warn!("Alarm {} on {} is firing", alarm.name, tg),
                        None => tracing::warn!("Unbound alarm {} is firing", alarm.name),
                    }
                    report.firing.push(alarm.name.clone());
                    report.status = report.status.worst(HealthStatus::Alarm);
                }
                (Ok(AlarmState::Ok), Some(_)) => {}
                (Ok(_), _) => {
                    report.unknown.push(alarm.name.clone());
                    report.status = report.status.worst(HealthStatus::Unknown);
                }
                (Err(e), _) => {
                    tracing::warn!("Could not read alarm {}: {}", alarm.name, e);
                    report.unknown.push(alarm.name.clone());
                    report.status = report.status.worst(HealthStatus::Unknown);
                }
            }
        }
        report
    }
}
