// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Parses the enabled hook list, rejecting hooks without a handler.

use serde::Deserialize;

use crate::hooks::HookName;

/// Hook names, loosely spelled. Only hooks with a handler may be enabled.
pub fn deserialize_hooks<'de, D>(deserializer: D) -> Result<Vec<HookName>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    let mut hooks = Vec::with_capacity(values.len());
    for value in values {
        let hook: HookName = value.parse().map_err(serde::de::Error::custom)?;
        if !HookName::EXPLICIT.contains(&hook) {
            return Err(serde::de::Error::custom(format!(
                "hook {hook} is run by the deployment process and cannot be enabled"
            )));
        }
        if !hooks.contains(&hook) {
            hooks.push(hook);
        }
    }
    Ok(hooks)
}
