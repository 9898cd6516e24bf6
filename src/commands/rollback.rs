// ABOUTME: Rollback command implementation.
// ABOUTME: Points production back at the standby slot of the registered group.

use switchyard::deploy::manual_rollback;
use switchyard::error::Result;
use switchyard::output::Output;

use super::Project;

pub async fn rollback(output: &Output) -> Result<()> {
    let mut project = Project::open()?;
    project.require_provisioned()?;
    let group = project.group()?;

    output.progress(&format!("Rolling back {}", group.name));
    let workspace = project.state.open();
    let active = manual_rollback(
        &workspace.balancer,
        &group,
        &project.config.load_balancer.arn,
        &project.config.test_traffic,
        project.config.retry,
    )
    .await?;

    project.state.absorb(&workspace);
    project.save()?;
    output.success(&format!("Rollback complete: {active} slot serving production"));
    Ok(())
}
