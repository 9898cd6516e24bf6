// ABOUTME: Local JSON state shared between CLI invocations.
// ABOUTME: Persists the simulated balancer, alarm states, registered groups and hook ledger.

mod error;

pub use error::StoreError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::alarms::{AlarmState, MemoryAlarms};
use crate::elb::{BalancerState, MemoryBalancer};
use crate::hooks::HookLedger;
use crate::registrar::{DeploymentGroup, GroupStore};
use crate::types::{AlarmName, DeploymentGroupName};

use error::{CreateDirSnafu, ParseSnafu, ReadSnafu, SerializeSnafu, WriteSnafu};

pub const STATE_DIR: &str = ".switchyard";
pub const STATE_FILENAME: &str = "state.json";

/// Everything switchyard remembers about the local environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalState {
    #[serde(default)]
    pub balancer: BalancerState,
    #[serde(default)]
    pub alarms: BTreeMap<AlarmName, AlarmState>,
    #[serde(default)]
    pub groups: BTreeMap<DeploymentGroupName, DeploymentGroup>,
    #[serde(default)]
    pub ledger: HookLedger,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl LocalState {
    /// Path of the state file under `dir`.
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(STATE_DIR).join(STATE_FILENAME)
    }

    /// Load state from `dir`. A missing file is an empty state.
    pub fn load(dir: &Path) -> Result<Self, StoreError> {
        let path = Self::path_in(dir);
        if !path.exists() {
            tracing::debug!("No state file at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).context(ReadSnafu { path: &path })?;
        serde_json::from_str(&content).context(ParseSnafu { path })
    }

    /// Write state to `dir`, replacing the previous file atomically.
    pub fn save(&mut self, dir: &Path) -> Result<(), StoreError> {
        let path = Self::path_in(dir);
        let parent = dir.join(STATE_DIR);
        std::fs::create_dir_all(&parent).context(CreateDirSnafu { path: &parent })?;

        self.saved_at = Some(Utc::now());
        let json = serde_json::to_string_pretty(self).context(SerializeSnafu)?;

        let tmp = parent.join(format!("{STATE_FILENAME}.tmp"));
        std::fs::write(&tmp, json).context(WriteSnafu { path: &tmp })?;
        std::fs::rename(&tmp, &path).context(WriteSnafu { path: &path })?;
        tracing::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Whether `provision` has seeded a load balancer.
    pub fn is_provisioned(&self) -> bool {
        !self.balancer.load_balancers.is_empty()
    }

    /// Live collaborators built from this state.
    pub fn open(&self) -> Workspace {
        Workspace {
            balancer: MemoryBalancer::from_state(self.balancer.clone()),
            alarms: MemoryAlarms::from_states(self.alarms.clone()),
            groups: GroupStore::from_groups(self.groups.clone()),
        }
    }

    /// Take back the state of collaborators returned by `open`.
    pub fn absorb(&mut self, workspace: &Workspace) {
        self.balancer = workspace.balancer.snapshot();
        self.alarms = workspace.alarms.snapshot();
        self.groups = workspace.groups.snapshot();
    }
}

/// In-memory balancer, alarms and group registry for one CLI invocation.
pub struct Workspace {
    pub balancer: MemoryBalancer,
    pub alarms: MemoryAlarms,
    pub groups: GroupStore,
}
