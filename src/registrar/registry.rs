// ABOUTME: Idempotent create/update/delete of deployment groups.
// ABOUTME: Validates referenced balancer resources and alarms before touching the store.

use chrono::Utc;

use super::error::RegistrarError;
use super::group::{
    DeploymentGroup, DeploymentGroupHandle, DeploymentGroupSpec, EcsService, GroupStore,
    UpsertOutcome,
};
use super::traffic::DeploymentConfigName;
use crate::alarms::{AlarmError, AlarmSource};
use crate::elb::{BalancerError, ListenerOps, TargetGroupOps};
use crate::types::{ApplicationName, DeploymentGroupName, SlotPair};

/// Registers deployment groups against a balancer and an alarm source.
pub struct Registrar<'a, B, A> {
    store: &'a GroupStore,
    balancer: &'a B,
    alarms: &'a A,
}

impl<'a, B, A> Registrar<'a, B, A>
where
    B: ListenerOps + TargetGroupOps,
    A: AlarmSource,
{
    pub fn new(store: &'a GroupStore, balancer: &'a B, alarms: &'a A) -> Self {
        Self {
            store,
            balancer,
            alarms,
        }
    }

    /// Create the named group, or update its mutable fields in place.
    ///
    /// Repeating an identical request returns `UpsertOutcome::Unchanged`
    /// and leaves the stored record untouched.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` for malformed names or an unknown deployment config
    /// - `ResourceNotFound` if a listener, target group or alarm is missing
    /// - `Conflict` if the structural fields of an existing group differ, or
    ///   another group already deploys the same application
    pub async fn upsert(
        &self,
        spec: &DeploymentGroupSpec,
    ) -> Result<DeploymentGroupHandle, RegistrarError> {
        let candidate = self.validate(spec)?;
        self.check_resources(&candidate).await?;

        self.store.with(|groups| {
            if let Some(other) = groups
                .values()
                .find(|g| g.application == candidate.application && g.name != candidate.name)
            {
                return Err(RegistrarError::Conflict {
                    name: candidate.name.clone(),
                    reason: format!(
                        "application '{}' already has deployment group '{}'",
                        candidate.application, other.name
                    ),
                });
            }

            let Some(existing) = groups.get_mut(&candidate.name) else {
                tracing::info!(
                    "Created deployment group {} for {}",
                    candidate.name,
                    candidate.application
                );
                let handle = handle(&candidate, UpsertOutcome::Created);
                groups.insert(candidate.name.clone(), candidate);
                return Ok(handle);
            };

            let diffs = existing.structural_differences(&candidate);
            if !diffs.is_empty() {
                return Err(RegistrarError::Conflict {
                    name: candidate.name.clone(),
                    reason: format!("cannot change {}", diffs.join(", ")),
                });
            }

            if existing.same_settings(&candidate) {
                tracing::debug!("Deployment group {} unchanged", existing.name);
                return Ok(handle(existing, UpsertOutcome::Unchanged));
            }

            existing.deployment_config = candidate.deployment_config;
            existing.service_role = candidate.service_role;
            existing.alarms = candidate.alarms;
            existing.alarm_slots = candidate.alarm_slots;
            existing.termination_wait = candidate.termination_wait;
            existing.ready_wait = candidate.ready_wait;
            existing.version += 1;
            existing.updated_at = Utc::now();
            tracing::info!(
                "Updated deployment group {} (version {})",
                existing.name,
                existing.version
            );
            Ok(handle(existing, UpsertOutcome::Updated))
        })
    }

    /// Remove the named group. Removing a missing group is a no-op.
    ///
    /// Returns whether a group was removed.
    pub fn delete(&self, name: &DeploymentGroupName) -> bool {
        let removed = self.store.with(|groups| groups.remove(name)).is_some();
        if removed {
            tracing::info!("Deleted deployment group {}", name);
        } else {
            tracing::debug!("Deployment group {} not registered", name);
        }
        removed
    }

    pub fn get(&self, name: &DeploymentGroupName) -> Option<DeploymentGroup> {
        self.store.get(name)
    }

    fn validate(&self, spec: &DeploymentGroupSpec) -> Result<DeploymentGroup, RegistrarError> {
        let application = ApplicationName::new(&spec.application_name).map_err(invalid)?;
        let name = DeploymentGroupName::new(&spec.deployment_group_name).map_err(invalid)?;
        let deployment_config: DeploymentConfigName = spec
            .deployment_config_name
            .parse()
            .map_err(invalid)?;
        let target_groups = SlotPair::new(
            spec.blue_target_group.clone(),
            spec.green_target_group.clone(),
        )
        .map_err(invalid)?;

        if spec.prod_listener_arn == spec.test_listener_arn {
            return Err(RegistrarError::InvalidConfig(format!(
                "production and test listener must differ (both are {})",
                spec.prod_listener_arn
            )));
        }
        if spec.service_role_arn.trim().is_empty() {
            return Err(RegistrarError::InvalidConfig(
                "service role cannot be empty".to_string(),
            ));
        }
        if spec.ecs_cluster_name.trim().is_empty() || spec.ecs_service_name.trim().is_empty() {
            return Err(RegistrarError::InvalidConfig(
                "ECS cluster and service names are required".to_string(),
            ));
        }

        let mut alarms = spec.alarms.clone();
        alarms.sort();
        alarms.dedup();
        if let Some(stray) = spec.alarm_slots.keys().find(|a| !alarms.contains(a)) {
            return Err(RegistrarError::InvalidConfig(format!(
                "alarm {stray} has a slot binding but is not a rollback alarm"
            )));
        }

        let now = Utc::now();
        Ok(DeploymentGroup {
            application,
            name,
            deployment_config,
            service_role: spec.service_role_arn.clone(),
            target_groups,
            prod_listener: spec.prod_listener_arn.clone(),
            test_listener: spec.test_listener_arn.clone(),
            alarms,
            alarm_slots: spec.alarm_slots.clone(),
            ecs: EcsService {
                cluster: spec.ecs_cluster_name.clone(),
                service: spec.ecs_service_name.clone(),
            },
            termination_wait: spec.termination_wait,
            ready_wait: spec.ready_wait,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    async fn check_resources(&self, group: &DeploymentGroup) -> Result<(), RegistrarError> {
        let prod = self
            .balancer
            .describe_listener(&group.prod_listener)
            .await
            .map_err(not_found)?;
        let test = self
            .balancer
            .describe_listener(&group.test_listener)
            .await
            .map_err(not_found)?;
        if prod.load_balancer != test.load_balancer {
            return Err(RegistrarError::InvalidConfig(format!(
                "listeners {} and {} belong to different load balancers",
                prod.arn, test.arn
            )));
        }

        for (_, target_group) in group.target_groups.iter() {
            self.balancer
                .describe_target_group(target_group)
                .await
                .map_err(not_found)?;
        }

        for alarm in &group.alarms {
            match self.alarms.alarm_state(alarm).await {
                Ok(_) => {}
                Err(AlarmError::NotFound(_)) => {
                    return Err(RegistrarError::ResourceNotFound(format!("alarm {alarm}")));
                }
                Err(e) => return Err(RegistrarError::Alarm(e)),
            }
        }
        Ok(())
    }
}

fn not_found(err: BalancerError) -> RegistrarError {
    if err.is_not_found() {
        RegistrarError::ResourceNotFound(err.to_string())
    } else {
        RegistrarError::Balancer(err)
    }
}

fn invalid(err: impl std::fmt::Display) -> RegistrarError {
    RegistrarError::InvalidConfig(err.to_string())
}

fn handle(group: &DeploymentGroup, outcome: UpsertOutcome) -> DeploymentGroupHandle {
    DeploymentGroupHandle {
        name: group.name.clone(),
        application: group.application.clone(),
        version: group.version,
        outcome,
    }
}
