// ABOUTME: Status command implementation.
// ABOUTME: Reports the deployment group, slot roles and alarm states.

use serde::Serialize;

use switchyard::alarms::AlarmState;
use switchyard::error::{Error, Result};
use switchyard::output::{Output, OutputMode};
use switchyard::rules::RuleController;
use switchyard::types::{AlarmName, SlotPair, SlotRole, TargetGroupArn};

use super::Project;

#[derive(Serialize)]
struct StatusReport {
    application: String,
    deployment_group: String,
    registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<u64>,
    deployment_config: String,
    slots: Vec<SlotStatus>,
    alarms: Vec<AlarmStatus>,
}

#[derive(Serialize)]
struct SlotStatus {
    slot: String,
    target_group: TargetGroupArn,
    role: SlotRole,
    targets: usize,
}

#[derive(Serialize)]
struct AlarmStatus {
    name: AlarmName,
    target_group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<AlarmState>,
}

pub async fn status(output: &Output) -> Result<()> {
    let project = Project::open()?;
    let config = &project.config;
    let group = project.state.groups.get(&config.deployment_group);

    let mut slots = Vec::new();
    if project.state.is_provisioned() {
        let workspace = project.state.open();
        let rules = RuleController::new(&workspace.balancer, config.retry);
        let pair = SlotPair::new(
            config.target_groups.blue.clone(),
            config.target_groups.green.clone(),
        )
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let roles = rules
            .slot_roles(
                &config.load_balancer.arn,
                &config.load_balancer.prod_listener,
                &config.load_balancer.test_listener,
                &pair,
                &config.test_traffic.header,
            )
            .await?;
        for (slot, role) in roles {
            let target_group = pair.get(slot).clone();
            let targets = rules.registered_targets(&target_group).await?.len();
            slots.push(SlotStatus {
                slot: slot.to_string(),
                target_group,
                role,
                targets,
            });
        }
    }

    let alarms = config
        .alarms
        .iter()
        .map(|a| AlarmStatus {
            name: a.name.clone(),
            target_group: a.target_group.to_string(),
            state: project.state.alarms.get(&a.name).copied(),
        })
        .collect();

    let report = StatusReport {
        application: config.application.to_string(),
        deployment_group: config.deployment_group.to_string(),
        registered: group.is_some(),
        version: group.map(|g| g.version),
        deployment_config: group
            .map(|g| g.deployment_config)
            .unwrap_or(config.deployment_config)
            .to_string(),
        slots,
        alarms,
    };

    if output.mode() == OutputMode::Json {
        output.value(&report)?;
        return Ok(());
    }
    print_report(&report, project.state.is_provisioned());
    Ok(())
}

fn print_report(report: &StatusReport, provisioned: bool) {
    println!("Application:      {}", report.application);
    match report.version {
        Some(version) => println!(
            "Deployment group: {} (version {version})",
            report.deployment_group
        ),
        None => println!("Deployment group: {} (not registered)", report.deployment_group),
    }
    println!("Traffic policy:   {}", report.deployment_config);

    if provisioned {
        println!("Slots:");
        for slot in &report.slots {
            println!(
                "  {:<6} {:<9} {} target(s)  {}",
                slot.slot,
                slot.role.to_string(),
                slot.targets,
                slot.target_group
            );
        }
    } else {
        println!("Slots:            not provisioned");
    }

    if !report.alarms.is_empty() {
        println!("Alarms:");
        for alarm in &report.alarms {
            let state = alarm
                .state
                .map(|s| s.to_string())
                .unwrap_or_else(|| "UNKNOWN".to_string());
            println!(
                "  {:<30} {:<6} {}",
                alarm.name.as_str(),
                alarm.target_group,
                state
            );
        }
    }
}
