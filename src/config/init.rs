// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates switchyard.yml template files.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::ApplicationName;

use super::{CONFIG_FILENAME, Config};

pub fn init_config(dir: &Path, application: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let application = ApplicationName::new(application.unwrap_or("my-app"))
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;

    let yaml = template_yaml(&application);
    // Never write a template the loader would reject.
    Config::from_yaml(&yaml)?;
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

/// Starter configuration for `application`, wired to the local balancer names
/// that `switchyard provision` creates.
pub fn template_yaml(application: &ApplicationName) -> String {
    format!(
        r#"application: {app}
deployment_group: {app}-dg
# CodeDeployDefault.ECS{{AllAtOnce, Linear10PercentEvery1Minutes,
#   Linear10PercentEvery3Minutes, Canary10Percent5Minutes, Canary10Percent15Minutes}}
deployment_config: CodeDeployDefault.ECSLinear10PercentEvery1Minutes
service_role: arn:aws:iam::123456789012:role/{app}-codedeploy

ecs:
  cluster: {app}-cluster
  service: {app}
  desired_count: 2

load_balancer:
  arn: arn:aws:elasticloadbalancing:local:000000000000:loadbalancer/app/{app}
  prod_listener: arn:aws:elasticloadbalancing:local:000000000000:listener/app/{app}/80
  test_listener: arn:aws:elasticloadbalancing:local:000000000000:listener/app/{app}/8080

target_groups:
  blue: arn:aws:elasticloadbalancing:local:000000000000:targetgroup/{app}-blue
  green: arn:aws:elasticloadbalancing:local:000000000000:targetgroup/{app}-green

alarms:
  - name: {app}-blue-5xx
    target_group: blue
  - name: {app}-green-5xx
    target_group: green
    threshold: 1
    period: 1m

# Requests carrying one of these header values reach the replacement slot
# through the test listener.
test_traffic:
  header: counter_no
  values: ["88888", "99999"]
  priority: 1

termination_wait: 5m
ready_wait: 0s

hooks:
  timeout: 30s
  enabled: [BeforeInstall, AfterAllowTestTraffic, BeforeAllowTraffic]

retry:
  attempts: 3
  initial_interval: 200ms
  backoff_coefficient: 2
  max_interval: 5s

final_step:
  unknown_retries: 3
  unknown_interval: 30s
"#,
        app = application
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_back() {
        let app = ApplicationName::new("books").unwrap();
        let config = Config::from_yaml(&template_yaml(&app)).unwrap();
        assert_eq!(config.application, app);
        assert_eq!(config.deployment_group.as_str(), "books-dg");
        assert_eq!(config.alarms.len(), 2);
        assert_eq!(config.ecs.desired_count, 2);
    }
}
