// ABOUTME: Test support utilities.
// ABOUTME: Builds a provisioned in-memory balancer, alarms and deployment group.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Once;
use std::time::Duration;

use switchyard::alarms::{AlarmDefinition, AlarmState, MemoryAlarms};
use switchyard::elb::{MemoryBalancer, TargetGroupOps};
use switchyard::registrar::{DeploymentConfigName, DeploymentGroup, DeploymentGroupSpec, EcsService};
use switchyard::types::{
    AlarmName, ApplicationName, DeploymentGroupName, ListenerArn, LoadBalancerArn, Slot,
    SlotPair, TargetGroupArn,
};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("switchyard=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
pub fn alb() -> LoadBalancerArn {
    LoadBalancerArn::new("arn:aws:elasticloadbalancing:local:0:loadbalancer/app/books")
}

#[allow(dead_code)]
pub fn prod() -> ListenerArn {
    ListenerArn::new("arn:aws:elasticloadbalancing:local:0:listener/app/books/80")
}

#[allow(dead_code)]
pub fn test_listener() -> ListenerArn {
    ListenerArn::new("arn:aws:elasticloadbalancing:local:0:listener/app/books/8080")
}

#[allow(dead_code)]
pub fn blue() -> TargetGroupArn {
    TargetGroupArn::new("arn:aws:elasticloadbalancing:local:0:targetgroup/books-blue")
}

#[allow(dead_code)]
pub fn green() -> TargetGroupArn {
    TargetGroupArn::new("arn:aws:elasticloadbalancing:local:0:targetgroup/books-green")
}

#[allow(dead_code)]
pub fn blue_alarm() -> AlarmName {
    AlarmName::new("books-blue-5xx")
}

#[allow(dead_code)]
pub fn green_alarm() -> AlarmName {
    AlarmName::new("books-green-5xx")
}

/// Load balancer with both listeners forwarding to blue, and two targets in blue.
#[allow(dead_code)]
pub async fn balancer() -> MemoryBalancer {
    let balancer = MemoryBalancer::new();
    balancer.add_load_balancer(alb());
    balancer.add_target_group(blue(), "books-blue");
    balancer.add_target_group(green(), "books-green");
    balancer.add_listener(&alb(), prod(), 80, &blue()).unwrap();
    balancer
        .add_listener(&alb(), test_listener(), 8080, &blue())
        .unwrap();
    balancer
        .register_targets(&blue(), &["books-initial-1".to_string(), "books-initial-2".to_string()])
        .await
        .unwrap();
    balancer
}

/// Both slot alarms, OK.
#[allow(dead_code)]
pub fn alarms() -> MemoryAlarms {
    let alarms = MemoryAlarms::new();
    alarms.set(blue_alarm(), AlarmState::Ok);
    alarms.set(green_alarm(), AlarmState::Ok);
    alarms
}

#[allow(dead_code)]
pub fn alarm_definitions() -> Vec<AlarmDefinition> {
    [(blue_alarm(), blue()), (green_alarm(), green())]
        .into_iter()
        .map(|(name, target_group)| AlarmDefinition {
            name,
            target_group,
            metric: "HTTPCode_Target_5XX_Count".to_string(),
            threshold: 1.0,
            evaluation_periods: 1,
            period: Duration::from_secs(60),
        })
        .collect()
}

#[allow(dead_code)]
fn alarm_slots() -> BTreeMap<AlarmName, Slot> {
    BTreeMap::from([(blue_alarm(), Slot::Blue), (green_alarm(), Slot::Green)])
}

/// A registered group for the books service, built without polling any alarm.
#[allow(dead_code)]
pub fn group(config: DeploymentConfigName) -> DeploymentGroup {
    let now = Utc::now();
    DeploymentGroup {
        application: ApplicationName::new("books").unwrap(),
        name: DeploymentGroupName::new("books-dg").unwrap(),
        deployment_config: config,
        service_role: "arn:aws:iam::0:role/books-codedeploy".to_string(),
        target_groups: SlotPair::new(blue(), green()).unwrap(),
        prod_listener: prod(),
        test_listener: test_listener(),
        alarms: vec![blue_alarm(), green_alarm()],
        alarm_slots: alarm_slots(),
        ecs: EcsService {
            cluster: "main".to_string(),
            service: "books".to_string(),
        },
        termination_wait: Duration::from_secs(300),
        ready_wait: Duration::ZERO,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

#[allow(dead_code)]
pub fn spec() -> DeploymentGroupSpec {
    DeploymentGroupSpec {
        application_name: "books".to_string(),
        deployment_group_name: "books-dg".to_string(),
        deployment_config_name: "CodeDeployDefault.ECSLinear10PercentEvery1Minutes".to_string(),
        service_role_arn: "arn:aws:iam::0:role/books-codedeploy".to_string(),
        blue_target_group: blue(),
        green_target_group: green(),
        prod_listener_arn: prod(),
        test_listener_arn: test_listener(),
        alarms: vec![green_alarm(), blue_alarm()],
        alarm_slots: alarm_slots(),
        ecs_cluster_name: "main".to_string(),
        ecs_service_name: "books".to_string(),
        termination_wait: Duration::from_secs(300),
        ready_wait: Duration::ZERO,
    }
}
