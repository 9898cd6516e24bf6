// ABOUTME: Config sections for the ECS service, load balancer, target groups, alarms and hooks.
// ABOUTME: Each section carries its own defaults.

use serde::Deserialize;
use std::time::Duration;

use super::deserialize::deserialize_hooks;
use crate::hooks::{DEFAULT_HOOK_TIMEOUT, HookName};
use crate::types::{AlarmName, ListenerArn, LoadBalancerArn, Slot, TargetGroupArn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EcsConfig {
    pub cluster: String,
    pub service: String,
    /// Targets registered in the replacement slot on install.
    #[serde(default = "default_desired_count")]
    pub desired_count: u32,
}

fn default_desired_count() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoadBalancerConfig {
    pub arn: LoadBalancerArn,
    pub prod_listener: ListenerArn,
    pub test_listener: ListenerArn,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetGroupsConfig {
    pub blue: TargetGroupArn,
    pub green: TargetGroupArn,
}

impl TargetGroupsConfig {
    pub fn get(&self, slot: Slot) -> &TargetGroupArn {
        match slot {
            Slot::Blue => &self.blue,
            Slot::Green => &self.green,
        }
    }
}

/// A rollback alarm bound to one slot's target group.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlarmConfig {
    pub name: AlarmName,
    pub target_group: Slot,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_evaluation_periods")]
    pub evaluation_periods: u32,
    #[serde(default = "default_period", with = "humantime_serde")]
    pub period: Duration,
}

fn default_metric() -> String {
    "HTTPCode_Target_5XX_Count".to_string()
}

fn default_threshold() -> f64 {
    1.0
}

fn default_evaluation_periods() -> u32 {
    1
}

fn default_period() -> Duration {
    Duration::from_secs(60)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HooksConfig {
    #[serde(default = "default_hook_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_enabled", deserialize_with = "deserialize_hooks")]
    pub enabled: Vec<HookName>,
}

fn default_hook_timeout() -> Duration {
    DEFAULT_HOOK_TIMEOUT
}

fn default_enabled() -> Vec<HookName> {
    HookName::EXPLICIT.to_vec()
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            timeout: default_hook_timeout(),
            enabled: default_enabled(),
        }
    }
}
