// ABOUTME: Deploy command implementation.
// ABOUTME: Runs a full cutover against the local balancer; Ctrl-C rolls it back.

use switchyard::alarms::HealthMonitor;
use switchyard::deploy::{CutoverContext, cancellation, run_deployment};
use switchyard::diagnostics::{Diagnostics, Warning};
use switchyard::elb::MemoryBalancer;
use switchyard::error::Result;
use switchyard::hooks::HookRegistry;
use switchyard::output::{Output, ProgressReporter};
use switchyard::rules::RuleController;
use switchyard::types::DeploymentId;

use super::Project;

pub async fn deploy(deployment_id: Option<String>, output: &mut Output) -> Result<()> {
    let mut project = Project::open()?;
    project.require_provisioned()?;
    let group = project.group()?;
    let config = project.config.clone();

    output.start_timer();
    let id = deployment_id.map_or_else(DeploymentId::generate, DeploymentId::new);
    output.progress(&format!(
        "Deploying {} ({}) as {}",
        group.name, group.deployment_config, id
    ));

    let workspace = project.state.open();
    let registry: HookRegistry<MemoryBalancer> = config
        .hook_registry()
        .with_ledger(project.state.ledger.clone());
    let mut diag = Diagnostics::default();

    let rules = RuleController::new(&workspace.balancer, config.retry);
    let alb = &config.load_balancer.arn;
    for listener in [&group.prod_listener, &group.test_listener] {
        let stale = rules
            .test_rules(alb, listener, &config.test_traffic.header)
            .await?;
        if !stale.is_empty() {
            diag.warn(Warning::stale_rules_removed(format!(
                "{} test rule(s) left on {} by an earlier deployment",
                stale.len(),
                listener
            )));
        }
    }

    let (cancel_tx, cancel_rx) = cancellation();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, rolling back");
            let _ = cancel_tx.send(true);
        }
    });

    let monitor = HealthMonitor::for_group(&workspace.alarms, &group);
    let ctx = CutoverContext::new(&workspace.balancer, monitor, &registry)
        .with_retry(config.retry)
        .with_final_step(config.final_step)
        .with_desired_count(config.ecs.desired_count)
        .with_cancellation(cancel_rx);

    let result = {
        let mut reporter = ProgressReporter::new(output, &mut diag);
        run_deployment(&ctx, group, alb.clone(), id.clone(), &mut reporter).await
    };
    interrupt.abort();

    project.state.ledger = registry.ledger();
    project.state.absorb(&workspace);
    project.save()?;

    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    let completed = result?;
    output.success(&format!(
        "Deployment {} complete: {} slot serving production",
        id,
        completed.replacement()
    ));
    Ok(())
}
