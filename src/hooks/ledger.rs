// ABOUTME: Per-deployment record of hook outcomes.
// ABOUTME: Detects replayed and out-of-order hook invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{HookName, HookStatus};
use crate::types::DeploymentId;

/// Deployments remembered by default.
const DEFAULT_RETAINED: usize = 20;

/// Last outcome of a hook for one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookRecord {
    pub status: HookStatus,
    pub attempts: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct DeploymentHooks {
    started_at: DateTime<Utc>,
    #[serde(default)]
    hooks: BTreeMap<HookName, HookRecord>,
}

/// Hook outcomes keyed by deployment id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookLedger {
    #[serde(default)]
    deployments: BTreeMap<DeploymentId, DeploymentHooks>,
}

impl HookLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_of(&self, deployment: &DeploymentId, hook: HookName) -> Option<&HookRecord> {
        self.deployments
            .get(deployment)
            .and_then(|d| d.hooks.get(&hook))
    }

    /// Whether `hook` already succeeded for `deployment`.
    pub fn succeeded(&self, deployment: &DeploymentId, hook: HookName) -> bool {
        self.record_of(deployment, hook)
            .is_some_and(|r| r.status.is_success())
    }

    /// First enabled predecessor of `hook` that has not succeeded yet.
    pub fn missing_predecessor(
        &self,
        deployment: &DeploymentId,
        hook: HookName,
        enabled: &[HookName],
    ) -> Option<HookName> {
        hook.predecessors()
            .filter(|h| enabled.contains(h))
            .find(|h| !self.succeeded(deployment, *h))
    }

    pub fn record(&mut self, deployment: &DeploymentId, hook: HookName, status: HookStatus) {
        let now = Utc::now();
        let entry = self
            .deployments
            .entry(deployment.clone())
            .or_insert_with(|| DeploymentHooks {
                started_at: now,
                hooks: BTreeMap::new(),
            });
        let attempts = entry.hooks.get(&hook).map_or(0, |r| r.attempts) + 1;
        entry.hooks.insert(
            hook,
            HookRecord {
                status,
                attempts,
                at: now,
            },
        );
        self.prune(DEFAULT_RETAINED);
    }

    /// Outcomes recorded for a deployment, in hook order.
    pub fn hooks(&self, deployment: &DeploymentId) -> Vec<(HookName, &HookRecord)> {
        self.deployments
            .get(deployment)
            .map(|d| d.hooks.iter().map(|(h, r)| (*h, r)).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, deployment: &DeploymentId) -> bool {
        self.deployments.contains_key(deployment)
    }

    /// Keep only the `keep` most recently started deployments.
    pub fn prune(&mut self, keep: usize) {
        if self.deployments.len() <= keep {
            return;
        }
        let mut by_age: Vec<(DateTime<Utc>, DeploymentId)> = self
            .deployments
            .iter()
            .map(|(id, d)| (d.started_at, id.clone()))
            .collect();
        by_age.sort();
        let excess = self.deployments.len() - keep;
        for (_, id) in by_age.into_iter().take(excess) {
            self.deployments.remove(&id);
        }
    }
}
