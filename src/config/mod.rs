// ABOUTME: Configuration types and parsing for switchyard.yml.
// ABOUTME: Maps the file onto deployment group specs, alarm bindings and hook settings.

mod deserialize;
mod init;
mod sections;

pub use init::{init_config, template_yaml};
pub use sections::{AlarmConfig, EcsConfig, HooksConfig, LoadBalancerConfig, TargetGroupsConfig};

use crate::alarms::AlarmDefinition;
use crate::deploy::FinalStepPolicy;
use crate::elb::{ListenerOps, TargetGroupOps};
use crate::error::{Error, Result};
use crate::hooks::HookRegistry;
use crate::registrar::{DeploymentConfigName, DeploymentGroupSpec};
use crate::retry::RetryPolicy;
use crate::rules::TestTrafficRule;
use crate::types::{ApplicationName, DeploymentGroupName};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "switchyard.yml";
pub const CONFIG_FILENAME_ALT: &str = "switchyard.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".switchyard/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub application: ApplicationName,

    pub deployment_group: DeploymentGroupName,

    #[serde(default = "default_deployment_config")]
    pub deployment_config: DeploymentConfigName,

    pub service_role: String,

    pub ecs: EcsConfig,

    pub load_balancer: LoadBalancerConfig,

    pub target_groups: TargetGroupsConfig,

    #[serde(default)]
    pub alarms: Vec<AlarmConfig>,

    #[serde(default)]
    pub test_traffic: TestTrafficRule,

    #[serde(default = "default_termination_wait", with = "humantime_serde")]
    pub termination_wait: Duration,

    #[serde(default, with = "humantime_serde")]
    pub ready_wait: Duration,

    #[serde(default)]
    pub hooks: HooksConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub final_step: FinalStepPolicy,
}

fn default_deployment_config() -> DeploymentConfigName {
    DeploymentConfigName::AllAtOnce
}

fn default_termination_wait() -> Duration {
    Duration::from_secs(300)
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        if self.target_groups.blue == self.target_groups.green {
            return Err(Error::InvalidConfig(format!(
                "blue and green target groups must differ (both are {})",
                self.target_groups.blue
            )));
        }
        if self.load_balancer.prod_listener == self.load_balancer.test_listener {
            return Err(Error::InvalidConfig(format!(
                "production and test listeners must differ (both are {})",
                self.load_balancer.prod_listener
            )));
        }
        let mut seen = BTreeSet::new();
        for alarm in &self.alarms {
            if !seen.insert(&alarm.name) {
                return Err(Error::InvalidConfig(format!(
                    "alarm '{}' is defined more than once",
                    alarm.name
                )));
            }
        }
        if self.ecs.desired_count == 0 {
            return Err(Error::InvalidConfig(
                "ecs.desired_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Registration request for this config's deployment group.
    pub fn to_group_spec(&self) -> DeploymentGroupSpec {
        DeploymentGroupSpec {
            application_name: self.application.to_string(),
            deployment_group_name: self.deployment_group.to_string(),
            deployment_config_name: self.deployment_config.as_str().to_string(),
            service_role_arn: self.service_role.clone(),
            blue_target_group: self.target_groups.blue.clone(),
            green_target_group: self.target_groups.green.clone(),
            prod_listener_arn: self.load_balancer.prod_listener.clone(),
            test_listener_arn: self.load_balancer.test_listener.clone(),
            alarms: self.alarms.iter().map(|a| a.name.clone()).collect(),
            alarm_slots: self
                .alarms
                .iter()
                .map(|a| (a.name.clone(), a.target_group))
                .collect(),
            ecs_cluster_name: self.ecs.cluster.clone(),
            ecs_service_name: self.ecs.service.clone(),
            termination_wait: self.termination_wait,
            ready_wait: self.ready_wait,
        }
    }

    /// Alarms with their slot resolved to a target group.
    pub fn alarm_definitions(&self) -> Vec<AlarmDefinition> {
        self.alarms
            .iter()
            .map(|a| AlarmDefinition {
                name: a.name.clone(),
                target_group: self.target_groups.get(a.target_group).clone(),
                metric: a.metric.clone(),
                threshold: a.threshold,
                evaluation_periods: a.evaluation_periods,
                period: a.period,
            })
            .collect()
    }

    /// Hook registry with this config's handlers, timeout and retry policy.
    pub fn hook_registry<B: ListenerOps + TargetGroupOps + 'static>(&self) -> HookRegistry<B> {
        HookRegistry::standard(self.test_traffic.clone())
            .with_enabled(&self.hooks.enabled)
            .with_timeout(self.hooks.timeout)
            .with_retry(self.retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlarmName, Slot, TargetGroupArn};

    const MINIMAL: &str = r#"
application: books
deployment_group: books-dg
service_role: role/codedeploy
ecs:
  cluster: main
  service: books
load_balancer:
  arn: alb/books
  prod_listener: listener/prod
  test_listener: listener/test
target_groups:
  blue: tg/blue
  green: tg/green
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.deployment_config, DeploymentConfigName::AllAtOnce);
        assert_eq!(config.test_traffic.header, "counter_no");
        assert_eq!(config.termination_wait, Duration::from_secs(300));
        assert_eq!(config.ready_wait, Duration::ZERO);
        assert_eq!(config.hooks.timeout, Duration::from_secs(30));
        assert_eq!(config.hooks.enabled.len(), 3);
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.ecs.desired_count, 1);
    }

    #[test]
    fn same_target_group_for_both_slots_is_invalid() {
        let yaml = MINIMAL.replace("green: tg/green", "green: tg/blue");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn alarm_slots_resolve_to_target_groups() {
        let yaml = format!(
            "{MINIMAL}alarms:\n  - name: green-5xx\n    target_group: green\n    threshold: 5\n"
        );
        let config = Config::from_yaml(&yaml).unwrap();
        let defs = config.alarm_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].target_group, TargetGroupArn::new("tg/green"));
        assert_eq!(defs[0].threshold, 5.0);
        assert_eq!(defs[0].period, Duration::from_secs(60));

        let spec = config.to_group_spec();
        assert_eq!(
            spec.alarm_slots.get(&AlarmName::new("green-5xx")),
            Some(&Slot::Green)
        );
    }

    #[test]
    fn group_spec_uses_canonical_config_name() {
        let yaml = format!("{MINIMAL}deployment_config: ECSLinear10PercentEvery1Minute\n");
        let spec = Config::from_yaml(&yaml).unwrap().to_group_spec();
        assert_eq!(
            spec.deployment_config_name,
            "CodeDeployDefault.ECSLinear10PercentEvery1Minutes"
        );
        assert_eq!(spec.deployment_group_name, "books-dg");
    }

    #[test]
    fn implicit_hooks_cannot_be_enabled() {
        let yaml = format!("{MINIMAL}hooks:\n  enabled: [BeforeInstall, AfterInstall]\n");
        assert!(Config::from_yaml(&yaml).is_err());
    }
}
