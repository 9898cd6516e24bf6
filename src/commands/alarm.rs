// ABOUTME: Alarm command implementation.
// ABOUTME: Changes the state of a local alarm so cutovers can be exercised.

use switchyard::alarms::AlarmState;
use switchyard::error::{Error, Result};
use switchyard::output::Output;
use switchyard::types::AlarmName;

use super::Project;

pub fn alarm(name: &str, state: AlarmState, output: &Output) -> Result<()> {
    let mut project = Project::open()?;
    let name = AlarmName::new(name);

    if !project.config.alarms.iter().any(|a| a.name == name) {
        return Err(Error::InvalidConfig(format!(
            "alarm '{name}' is not defined in the configuration"
        )));
    }

    let previous = project.state.alarms.insert(name.clone(), state);
    project.save()?;
    match previous {
        Some(previous) if previous != state => {
            tracing::info!("Alarm {} changed from {} to {}", name, previous, state);
        }
        _ => {}
    }
    output.success(&format!("Alarm {name} is {state}"));
    Ok(())
}
