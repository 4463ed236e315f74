use std::sync::Arc;

use cmgr_core::deps::{DependencySnapshot, PACKAGE_MANAGER, VM_TOOLCHAIN};
use cmgr_core::error::{Fault, FaultResult};
use cmgr_core::lock::ALL_PROFILES;
use tracing::{debug, info, warn};

use crate::shell::CommandError;
use crate::traits::DependencyChecker;

/// Wrap a checker failure as a fault against `dependency`. Cancellation is
/// host-wide, so it is reported against every profile.
fn dependency_fault(dependency: &str, err: CommandError) -> Fault {
    if err.is_cancelled() {
        return Fault::Cancelled {
            operation: "dependencies".to_string(),
            profile: ALL_PROFILES.to_string(),
        };
    }
    Fault::dependency(dependency, err.to_string())
}

/// Checks host prerequisites and performs the single self-healing upgrade
/// attempt used before a start.
#[derive(Clone)]
pub struct DependencyBootstrapper {
    checker: Arc<dyn DependencyChecker>,
}

impl DependencyBootstrapper {
    pub fn new(checker: Arc<dyn DependencyChecker>) -> Self {
        Self { checker }
    }

    /// Check package manager, VM tool and backend, in that order.
    ///
    /// A missing package manager fails immediately since every later check
    /// goes through it. The VM tool and backend are both probed even when
    /// one is absent; absence is recorded in the snapshot, not returned as
    /// a fault.
    pub async fn check_all(&self) -> FaultResult<DependencySnapshot> {
        let prefix = self
            .checker
            .package_manager()
            .await
            .map_err(|e| dependency_fault(PACKAGE_MANAGER, e))?;
        let Some(homebrew_path) = prefix else {
            return Err(Fault::dependency(
                PACKAGE_MANAGER,
                "not installed or not in PATH",
            ));
        };

        let tool = self.checker.vm_tool().await;
        let backend = self.checker.backend().await;
        let tool = tool.map_err(|e| dependency_fault(VM_TOOLCHAIN, e))?;
        let backend = backend.map_err(|e| dependency_fault(VM_TOOLCHAIN, e))?;

        let snapshot = DependencySnapshot {
            homebrew: true,
            homebrew_path,
            colima: tool.present,
            colima_version: tool.version,
            colima_path: tool.path,
            lima: backend.present,
            lima_version: backend.version,
        };
        debug!(?snapshot, "Dependency check complete");
        Ok(snapshot)
    }

    /// Refresh the package manager, then upgrade the VM tool and backend.
    /// Callers re-run [`check_all`](Self::check_all) to see the result.
    pub async fn update_all(&self) -> FaultResult<()> {
        info!("Updating package manager");
        self.checker
            .refresh()
            .await
            .map_err(|e| dependency_fault(PACKAGE_MANAGER, e))?;

        info!("Upgrading VM tool and backend");
        self.checker
            .upgrade()
            .await
            .map_err(|e| dependency_fault(VM_TOOLCHAIN, e))?;
        Ok(())
    }

    /// Make sure the VM tool and backend are installed, running at most one
    /// [`update_all`](Self::update_all) to fix them.
    pub async fn ensure_vm_toolchain(&self) -> FaultResult<DependencySnapshot> {
        let snapshot = self.check_all().await?;
        if snapshot.vm_ready() {
            return Ok(snapshot);
        }

        warn!(missing = ?snapshot.missing(), "Missing dependencies, attempting update");
        self.update_all().await?;

        let snapshot = self.check_all().await?;
        if !snapshot.vm_ready() {
            return Err(Fault::dependency(
                VM_TOOLCHAIN,
                "failed to install required dependencies",
            ));
        }
        info!("Dependencies installed");
        Ok(snapshot)
    }
}
