//! Narrow capabilities the orchestrator consumes. Production implementations
//! live in [`crate::colima`], [`crate::brew`] and [`crate::fs`]; in-memory
//! fakes live in `testing`.

use std::path::Path;

use async_trait::async_trait;
use cmgr_core::deps::{BackendProbe, ToolProbe};
use cmgr_core::profile::ProfileConfig;

use crate::shell::{CommandError, CommandOutput};

/// The external tool that creates, starts, stops and deletes profile VMs.
#[async_trait]
pub trait VmManager: Send + Sync {
    /// Start a profile with an already-merged config.
    async fn start(&self, config: &ProfileConfig) -> Result<(), CommandError>;

    async fn stop(&self, profile: &str) -> Result<(), CommandError>;

    /// Stop every profile.
    async fn stop_all(&self) -> Result<(), CommandError>;

    /// Stop the auxiliary background daemon for a profile.
    async fn stop_daemon(&self, profile: &str) -> Result<(), CommandError>;

    /// Run the status probe. A non-zero exit is returned in the output so the
    /// classifier can inspect it.
    async fn probe_status(&self, profile: &str) -> Result<CommandOutput, CommandError>;

    async fn delete(&self, profile: &str) -> Result<(), CommandError>;

    /// Delete every profile.
    async fn delete_all(&self) -> Result<(), CommandError>;

    /// Read the Kubernetes credentials written for a profile.
    async fn read_credentials(&self, profile: &str) -> Result<String, CommandError>;
}

/// Host prerequisite checks and upgrades.
#[async_trait]
pub trait DependencyChecker: Send + Sync {
    /// Install prefix of the package manager, or `None` when absent.
    async fn package_manager(&self) -> Result<Option<String>, CommandError>;

    async fn vm_tool(&self) -> Result<ToolProbe, CommandError>;

    async fn backend(&self) -> Result<BackendProbe, CommandError>;

    /// Refresh the package manager's index.
    async fn refresh(&self) -> Result<(), CommandError>;

    /// Install or upgrade the VM tool and backend together.
    async fn upgrade(&self) -> Result<(), CommandError>;
}

/// Local view of the VM manager's on-disk state.
#[async_trait]
pub trait StateStore: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    /// Remove a directory tree. A directory that is already gone is not an error.
    async fn remove_dir_all(&self, path: &Path) -> std::io::Result<()>;
}
