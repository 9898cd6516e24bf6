// ABOUTME: Provision command implementation.
// ABOUTME: Seeds the local balancer and alarm states from the config.

use switchyard::alarms::AlarmState;
use switchyard::elb::TargetGroupOps;
use switchyard::error::Result;
use switchyard::output::Output;
use switchyard::types::Slot;

use super::Project;

const PROD_PORT: u16 = 80;
const TEST_PORT: u16 = 8080;

/// Create the load balancer, both listeners forwarding to blue, both target
/// groups and every configured alarm. Existing resources are left alone.
pub async fn provision(output: &Output) -> Result<()> {
    let mut project = Project::open()?;
    let config = &project.config;

    for alarm in &config.alarms {
        project
            .state
            .alarms
            .entry(alarm.name.clone())
            .or_insert(AlarmState::Ok);
    }

    let workspace = project.state.open();
    let balancer = &workspace.balancer;
    let lb = &config.load_balancer;

    balancer.add_load_balancer(lb.arn.clone());
    for slot in Slot::ALL {
        let name = format!("{}-{}", config.ecs.service, slot);
        balancer.add_target_group(config.target_groups.get(slot).clone(), name);
    }
    balancer.add_listener(&lb.arn, lb.prod_listener.clone(), PROD_PORT, &config.target_groups.blue)?;
    balancer.add_listener(&lb.arn, lb.test_listener.clone(), TEST_PORT, &config.target_groups.blue)?;

    let blue = &config.target_groups.blue;
    let current = balancer.describe_target_group(blue).await?;
    if current.targets.is_empty() {
        let targets: Vec<String> = (1..=config.ecs.desired_count)
            .map(|n| format!("{}-initial-{n}", config.ecs.service))
            .collect();
        balancer.register_targets(blue, &targets).await?;
        tracing::info!("Registered {} initial target(s) in {}", targets.len(), blue);
    }

    let message = format!("Provisioned {} with {} alarm(s)", lb.arn, config.alarms.len());
    project.state.absorb(&workspace);
    project.save()?;
    output.success(&message);
    Ok(())
}
