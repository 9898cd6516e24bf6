// ABOUTME: Hook command implementation.
// ABOUTME: Dispatches one lifecycle hook against the local balancer and prints its status.

use std::path::Path;

use switchyard::config::Config;
use switchyard::diagnostics::{Diagnostics, Warning};
use switchyard::elb::MemoryBalancer;
use switchyard::error::{Error, Result};
use switchyard::hooks::{HookName, HookRegistry, HookRequest, HookStatus};
use switchyard::output::Output;
use switchyard::types::DeploymentId;

use super::Project;

pub async fn hook(
    hook: HookName,
    deployment_id: Option<String>,
    request: Option<&Path>,
    output: &Output,
) -> Result<()> {
    let mut project = Project::open()?;
    project.require_provisioned()?;

    let request = match request {
        Some(path) => read_request(path, hook, deployment_id)?,
        None => request_from_config(&project.config, hook, deployment_id),
    };

    let mut diag = Diagnostics::default();
    if project
        .state
        .ledger
        .succeeded(&request.deployment_id, request.hook_name)
    {
        diag.warn(Warning::hook_replayed(format!(
            "{} already succeeded for deployment {}",
            request.hook_name, request.deployment_id
        )));
    }

    let workspace = project.state.open();
    let registry: HookRegistry<MemoryBalancer> = project
        .config
        .hook_registry()
        .with_ledger(project.state.ledger.clone());
    let response = registry.dispatch(&workspace.balancer, &request).await;

    project.state.ledger = registry.ledger();
    project.state.absorb(&workspace);
    project.save()?;

    output.value(&response)?;
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    match response.status {
        HookStatus::Succeeded => Ok(()),
        HookStatus::Failed(reason) => Err(Error::HookFailed {
            hook: response.hook_name.to_string(),
            reason: reason.to_string(),
        }),
    }
}

fn read_request(path: &Path, hook: HookName, deployment_id: Option<String>) -> Result<HookRequest> {
    let content = std::fs::read_to_string(path)?;
    let mut request: HookRequest = serde_json::from_str(&content)?;
    if request.hook_name != hook {
        return Err(Error::InvalidRequest(format!(
            "request is for {} but {} was invoked",
            request.hook_name, hook
        )));
    }
    if let Some(id) = deployment_id {
        request.deployment_id = DeploymentId::new(id);
    }
    Ok(request)
}

fn request_from_config(
    config: &Config,
    hook: HookName,
    deployment_id: Option<String>,
) -> HookRequest {
    let deployment_id = deployment_id.map_or_else(DeploymentId::generate, DeploymentId::new);
    HookRequest {
        hook_name: hook,
        deployment_id,
        lifecycle_event_hook_execution_id: None,
        alb_arn: config.load_balancer.arn.clone(),
        prod_listener_arn: config.load_balancer.prod_listener.clone(),
        test_listener_arn: config.load_balancer.test_listener.clone(),
        target_group_arn_x: config.target_groups.blue.clone(),
        target_group_arn_y: config.target_groups.green.clone(),
    }
}
