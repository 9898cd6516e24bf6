// ABOUTME: Application-wide error types for switchyard.
// ABOUTME: Wraps subsystem errors so the CLI reports every failure the same way.

use std::path::PathBuf;
use thiserror::Error;

use crate::deploy::{DeployError, DeployErrorKind};
use crate::elb::BalancerError;
use crate::registrar::RegistrarError;
use crate::rules::RuleError;
use crate::store::StoreError;
use crate::types::DeploymentGroupName;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("deployment group {0} is not registered (run `switchyard register`)")]
    GroupNotRegistered(DeploymentGroupName),

    #[error("no local load balancer found (run `switchyard provision`)")]
    NotProvisioned,

    #[error("invalid hook request: {0}")]
    InvalidRequest(String),

    #[error("hook {hook} failed: {reason}")]
    HookFailed { hook: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registrar(#[from] RegistrarError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Balancer(#[from] BalancerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True when production traffic may be split and an operator must step in.
    pub fn needs_manual_intervention(&self) -> bool {
        matches!(self, Error::Deploy(e) if e.kind() == DeployErrorKind::ManualIntervention)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
