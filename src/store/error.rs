// ABOUTME: Local state store error types with SNAFU pattern.
// ABOUTME: Each variant carries the path of the file or directory involved.

use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("failed to read state file {}: {source}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("state file {} is corrupt: {source}", path.display()))]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("failed to create state directory {}: {source}", path.display()))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to serialize state: {source}"))]
    Serialize { source: serde_json::Error },

    #[snafu(display("failed to write state file {}: {source}", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StoreError {
    /// Path involved in the failure, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            StoreError::Read { path, .. }
            | StoreError::Parse { path, .. }
            | StoreError::CreateDir { path, .. }
            | StoreError::Write { path, .. } => Some(path),
            StoreError::Serialize { .. } => None,
        }
    }
}
