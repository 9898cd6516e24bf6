// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, file discovery and the init template.

use std::fs;
use std::time::Duration;
use switchyard::config::*;
use switchyard::error::Error;
use switchyard::hooks::HookName;
use switchyard::registrar::DeploymentConfigName;
use switchyard::types::{ApplicationName, Slot};

const MINIMAL: &str = r#"
application: books
deployment_group: books-dg
service_role: arn:aws:iam::0:role/books
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

mod parsing {
    use super::*;

    #[test]
    fn parse_full_config() {
        let yaml = r#"
application: books
deployment_group: books-dg
deployment_config: ECSCanary10Percent15Minutes
service_role: arn:aws:iam::0:role/books
ecs:
  cluster: main
  service: books
  desired_count: 4
load_balancer:
  arn: alb/books
  prod_listener: listener/prod
  test_listener: listener/test
target_groups:
  blue: tg/blue
  green: tg/green
alarms:
  - name: books-green-latency
    target_group: green
    metric: TargetResponseTime
    threshold: 0.5
    evaluation_periods: 3
    period: 30s
test_traffic:
  header: x-qa
  values: ["7"]
  priority: 20
termination_wait: 1h
ready_wait: 2m
hooks:
  timeout: 10s
  enabled: [before-install, AfterAllowTestTraffic]
retry:
  attempts: 5
  initial_interval: 1s
final_step:
  unknown_retries: 1
  unknown_interval: 5s
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(
            config.deployment_config,
            DeploymentConfigName::Canary10Percent15Minutes
        );
        assert_eq!(config.ecs.desired_count, 4);
        assert_eq!(config.alarms[0].target_group, Slot::Green);
        assert_eq!(config.alarms[0].evaluation_periods, 3);
        assert_eq!(config.alarms[0].period, Duration::from_secs(30));
        assert_eq!(config.test_traffic.header, "x-qa");
        assert_eq!(config.test_traffic.values.len(), 1);
        assert_eq!(config.test_traffic.priority, 20);
        assert_eq!(config.termination_wait, Duration::from_secs(3600));
        assert_eq!(config.ready_wait, Duration::from_secs(120));
        assert_eq!(config.hooks.timeout, Duration::from_secs(10));
        assert_eq!(
            config.hooks.enabled,
            vec![HookName::BeforeInstall, HookName::AfterAllowTestTraffic]
        );
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.initial_interval, Duration::from_secs(1));
        assert_eq!(config.final_step.unknown_retries, 1);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let yaml = MINIMAL.replace("service_role: arn:aws:iam::0:role/books\n", "");
        assert!(matches!(Config::from_yaml(&yaml), Err(Error::Yaml(_))));
    }

    #[test]
    fn invalid_application_name_is_rejected() {
        let yaml = MINIMAL.replace("application: books", "application: \"books app\"");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn unknown_deployment_config_is_rejected() {
        let yaml = format!("{MINIMAL}deployment_config: ECSHalfAtOnce\n");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn empty_test_traffic_values_are_rejected() {
        let yaml = format!("{MINIMAL}test_traffic:\n  values: []\n");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn duplicate_alarms_are_rejected() {
        let yaml = format!(
            "{MINIMAL}alarms:\n  - name: a\n    target_group: blue\n  - name: a\n    target_group: green\n"
        );
        assert!(matches!(
            Config::from_yaml(&yaml),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn identical_listeners_are_rejected() {
        let yaml = MINIMAL.replace("test_listener: listener/test", "test_listener: listener/prod");
        assert!(matches!(
            Config::from_yaml(&yaml),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_desired_count_is_rejected() {
        let yaml = MINIMAL.replace("service: books\n", "service: books\n  desired_count: 0\n");
        assert!(matches!(
            Config::from_yaml(&yaml),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn disabling_hooks_is_allowed() {
        let yaml = format!("{MINIMAL}hooks:\n  enabled: []\n");
        let config = Config::from_yaml(&yaml).unwrap();
        assert!(config.hooks.enabled.is_empty());
    }
}

mod discovery {
    use super::*;

    #[test]
    fn finds_each_supported_location() {
        for name in [CONFIG_FILENAME, CONFIG_FILENAME_ALT, CONFIG_FILENAME_DIR] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, MINIMAL).unwrap();

            let config = Config::discover(dir.path()).unwrap();
            assert_eq!(config.application.as_str(), "books", "{name}");
        }
    }

    #[test]
    fn primary_filename_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), MINIMAL).unwrap();
        fs::write(
            dir.path().join(CONFIG_FILENAME_ALT),
            MINIMAL.replace("application: books", "application: other"),
        )
        .unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.application.as_str(), "books");
    }

    #[test]
    fn empty_directory_is_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::discover(dir.path()),
            Err(Error::ConfigNotFound(_))
        ));
    }
}

mod init {
    use super::*;

    #[test]
    fn init_writes_a_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), Some("orders"), false).unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.application.as_str(), "orders");
        assert_eq!(config.deployment_group.as_str(), "orders-dg");
        assert_eq!(config.alarm_definitions().len(), 2);
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "keep me").unwrap();

        let err = init_config(dir.path(), None, false).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(
            fs::read_to_string(dir.path().join(CONFIG_FILENAME)).unwrap(),
            "keep me"
        );

        init_config(dir.path(), None, true).unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.application.as_str(), "my-app");
    }

    #[test]
    fn init_rejects_invalid_application_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = init_config(dir.path(), Some("my app"), false).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn template_hook_registry_enables_explicit_hooks() {
        let app = ApplicationName::new("books").unwrap();
        let config = Config::from_yaml(&template_yaml(&app)).unwrap();
        let registry = config.hook_registry::<switchyard::elb::MemoryBalancer>();
        for hook in HookName::EXPLICIT {
            assert!(registry.is_enabled(hook));
        }
        assert!(!registry.is_enabled(HookName::AfterInstall));
    }
}
