// ABOUTME: Command module aggregator for the switchyard CLI.
// ABOUTME: Shares project loading and state persistence between command handlers.

mod alarm;
mod deploy;
mod hook;
mod init;
mod provision;
mod register;
mod rollback;
mod status;

pub use alarm::alarm;
pub use deploy::deploy;
pub use hook::hook;
pub use init::init;
pub use provision::provision;
pub use register::{deregister, register};
pub use rollback::rollback;
pub use status::status;

use std::env;
use std::path::PathBuf;

use switchyard::config::Config;
use switchyard::error::{Error, Result};
use switchyard::registrar::DeploymentGroup;
use switchyard::store::LocalState;

/// Config and local state of the project in the working directory.
pub(crate) struct Project {
    pub dir: PathBuf,
    pub config: Config,
    pub state: LocalState,
}

impl Project {
    pub fn open() -> Result<Self> {
        let dir = env::current_dir()?;
        let config = Config::discover(&dir)?;
        let state = LocalState::load(&dir)?;
        Ok(Self { dir, config, state })
    }

    pub fn save(&mut self) -> Result<()> {
        self.state.save(&self.dir)?;
        Ok(())
    }

    pub fn require_provisioned(&self) -> Result<()> {
        if self.state.is_provisioned() {
            Ok(())
        } else {
            Err(Error::NotProvisioned)
        }
    }

    /// The registered group named by the config.
    pub fn group(&self) -> Result<DeploymentGroup> {
        self.state
            .groups
            .get(&self.config.deployment_group)
            .cloned()
            .ok_or_else(|| Error::GroupNotRegistered(self.config.deployment_group.clone()))
    }
}
