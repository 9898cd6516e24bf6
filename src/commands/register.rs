// ABOUTME: Register and deregister command implementations.
// ABOUTME: Upserts or removes the config's deployment group in the local registry.

use switchyard::error::Result;
use switchyard::output::Output;
use switchyard::registrar::{Registrar, UpsertOutcome};

use super::Project;

pub async fn register(output: &Output) -> Result<()> {
    let mut project = Project::open()?;
    project.require_provisioned()?;

    let spec = project.config.to_group_spec();
    let workspace = project.state.open();
    let registrar = Registrar::new(&workspace.groups, &workspace.balancer, &workspace.alarms);
    let handle = registrar.upsert(&spec).await?;

    let message = match handle.outcome {
        UpsertOutcome::Created => format!("Registered deployment group {}", handle.name),
        UpsertOutcome::Updated => format!(
            "Updated deployment group {} (version {})",
            handle.name, handle.version
        ),
        UpsertOutcome::Unchanged => format!("Deployment group {} is up to date", handle.name),
    };

    if handle.outcome != UpsertOutcome::Unchanged {
        project.state.absorb(&workspace);
        project.save()?;
    }
    output.success(&message);
    Ok(())
}

pub fn deregister(output: &Output) -> Result<()> {
    let mut project = Project::open()?;
    let name = project.config.deployment_group.clone();

    let workspace = project.state.open();
    let registrar = Registrar::new(&workspace.groups, &workspace.balancer, &workspace.alarms);
    if registrar.delete(&name) {
        project.state.absorb(&workspace);
        project.save()?;
        output.success(&format!("Deregistered deployment group {name}"));
    } else {
        output.success(&format!("Deployment group {name} was not registered"));
    }
    Ok(())
}
