// ABOUTME: Deployment group records: the raw registration request and the validated record.
// ABOUTME: GroupStore keeps the registered groups keyed by name.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::traffic::DeploymentConfigName;
use crate::types::{
    AlarmName, ApplicationName, DeploymentGroupName, ListenerArn, Slot, SlotPair, TargetGroupArn,
};

/// A registration request, as received from the provisioning layer.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentGroupSpec {
    pub application_name: String,
    pub deployment_group_name: String,
    pub deployment_config_name: String,
    pub service_role_arn: String,
    pub blue_target_group: TargetGroupArn,
    pub green_target_group: TargetGroupArn,
    pub prod_listener_arn: ListenerArn,
    pub test_listener_arn: ListenerArn,
    pub alarms: Vec<AlarmName>,
    /// Slot each alarm watches. Alarms missing here are registered unbound.
    pub alarm_slots: BTreeMap<AlarmName, Slot>,
    pub ecs_cluster_name: String,
    pub ecs_service_name: String,
    pub termination_wait: Duration,
    pub ready_wait: Duration,
}

/// The ECS service a deployment group deploys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcsService {
    pub cluster: String,
    pub service: String,
}

/// A registered deployment group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentGroup {
    pub application: ApplicationName,
    pub name: DeploymentGroupName,
    pub deployment_config: DeploymentConfigName,
    pub service_role: String,
    pub target_groups: SlotPair,
    pub prod_listener: ListenerArn,
    pub test_listener: ListenerArn,
    /// Rollback alarms, sorted and without duplicates.
    pub alarms: Vec<AlarmName>,
    /// Slot each rollback alarm watches.
    #[serde(default)]
    pub alarm_slots: BTreeMap<AlarmName, Slot>,
    pub ecs: EcsService,
    #[serde(with = "humantime_serde")]
    pub termination_wait: Duration,
    #[serde(with = "humantime_serde")]
    pub ready_wait: Duration,
    /// Bumped on every update.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentGroup {
    /// Differences in fields that may never change after creation.
    pub(super) fn structural_differences(&self, other: &DeploymentGroup) -> Vec<&'static str> {
        let mut diffs = Vec::new();
        if self.application != other.application {
            diffs.push("application");
        }
        if self.target_groups != other.target_groups {
            diffs.push("target group pair");
        }
        if self.prod_listener != other.prod_listener {
            diffs.push("production listener");
        }
        if self.test_listener != other.test_listener {
            diffs.push("test listener");
        }
        if self.ecs != other.ecs {
            diffs.push("ECS service");
        }
        diffs
    }

    /// Whether the mutable fields match.
    /// Target group watched by `alarm`, if the group bound it to a slot.
    pub fn alarm_target(&self, alarm: &AlarmName) -> Option<&TargetGroupArn> {
        self.alarm_slots
            .get(alarm)
            .map(|slot| self.target_groups.get(*slot))
    }

    pub(super) fn same_settings(&self, other: &DeploymentGroup) -> bool {
        self.deployment_config == other.deployment_config
            && self.service_role == other.service_role
            && self.alarms == other.alarms
            && self.alarm_slots == other.alarm_slots
            && self.termination_wait == other.termination_wait
            && self.ready_wait == other.ready_wait
    }
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Returned by a successful upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentGroupHandle {
    pub name: DeploymentGroupName,
    pub application: ApplicationName,
    pub version: u64,
    pub outcome: UpsertOutcome,
}

/// Registered deployment groups.
#[derive(Debug, Default)]
pub struct GroupStore {
    groups: Mutex<BTreeMap<DeploymentGroupName, DeploymentGroup>>,
}

impl GroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_groups(groups: BTreeMap<DeploymentGroupName, DeploymentGroup>) -> Self {
        Self {
            groups: Mutex::new(groups),
        }
    }

    pub fn snapshot(&self) -> BTreeMap<DeploymentGroupName, DeploymentGroup> {
        self.groups.lock().clone()
    }

    pub fn get(&self, name: &DeploymentGroupName) -> Option<DeploymentGroup> {
        self.groups.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.groups.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.lock().is_empty()
    }

    /// Run `f` with exclusive access to the groups.
    pub(super) fn with<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<DeploymentGroupName, DeploymentGroup>) -> T,
    ) -> T {
        f(&mut self.groups.lock())
    }
}
