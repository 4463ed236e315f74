//! Lock-guarded profile lifecycle operations.
//!
//! Mutating operations (start, stop, clean) take the profile's entry in the
//! [`ProfileLocks`] registry and fail fast with `ProfileBusy` on contention.
//! Status and kubeconfig reads never touch the registry and may observe a
//! profile mid-transition.

use std::sync::Arc;

use cmgr_core::classify::{ProbeInput, classify};
use cmgr_core::deps::DependencySnapshot;
use cmgr_core::error::{Fault, FaultResult};
use cmgr_core::layout::StateLayout;
use cmgr_core::lock::{ALL_PROFILES, ProfileGuard, ProfileLocks};
use cmgr_core::naming::validate_profile;
use cmgr_core::profile::{CleanTarget, ProfileConfig, ProfileStatus, profile_or_default};
use tracing::{debug, info, warn};

use crate::bootstrap::DependencyBootstrapper;
use crate::brew::Homebrew;
use crate::colima::ColimaCli;
use crate::fs::LocalStateStore;
use crate::shell::{CommandError, Shell};
use crate::traits::{DependencyChecker, StateStore, VmManager};

/// Wrap a collaborator failure into the fault for `operation`.
fn command_fault(operation: &str, profile: &str, err: CommandError) -> Fault {
    if err.is_cancelled() {
        return Fault::Cancelled {
            operation: operation.to_string(),
            profile: profile.to_string(),
        };
    }
    Fault::vm_manager(operation, profile, err.to_string())
}

/// Resolve an empty name to the default profile and validate it.
fn resolve(profile: &str) -> FaultResult<String> {
    let name = profile_or_default(profile);
    validate_profile(name)?;
    Ok(name.to_string())
}

pub struct ProfileOrchestrator {
    vm: Arc<dyn VmManager>,
    deps: DependencyBootstrapper,
    store: Arc<dyn StateStore>,
    layout: StateLayout,
    locks: Arc<ProfileLocks>,
}

impl ProfileOrchestrator {
    pub fn new(
        vm: Arc<dyn VmManager>,
        checker: Arc<dyn DependencyChecker>,
        store: Arc<dyn StateStore>,
        layout: StateLayout,
        locks: Arc<ProfileLocks>,
    ) -> Self {
        Self {
            vm,
            deps: DependencyBootstrapper::new(checker),
            store,
            layout,
            locks,
        }
    }

    /// Orchestrator over the real `colima`, Homebrew and local filesystem.
    /// Every subprocess is killed when the shell's token is cancelled.
    pub fn production(shell: Shell, layout: StateLayout) -> Self {
        Self::new(
            Arc::new(ColimaCli::new(shell.clone(), layout.clone())),
            Arc::new(Homebrew::new(shell)),
            Arc::new(LocalStateStore),
            layout,
            Arc::new(ProfileLocks::new()),
        )
    }

    pub fn locks(&self) -> &Arc<ProfileLocks> {
        &self.locks
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    fn lock(&self, name: &str) -> FaultResult<ProfileGuard> {
        self.locks.try_lock(name).ok_or_else(|| {
            info!(profile = %name, "Profile busy");
            Fault::ProfileBusy {
                profile: name.to_string(),
            }
        })
    }

    fn exists(&self, profile: &str) -> bool {
        self.store.exists(&self.layout.profile_dir(profile))
    }

    fn require_exists(&self, profile: &str) -> FaultResult<()> {
        if self.exists(profile) {
            Ok(())
        } else {
            Err(Fault::ProfileNotFound {
                profile: profile.to_string(),
            })
        }
    }

    /// Start a profile. Unset fields are filled with defaults and missing
    /// dependencies get one remediation attempt. Returns once the VM manager
    /// reports the start succeeded; readiness is a separate poll.
    pub async fn start(&self, config: ProfileConfig) -> FaultResult<()> {
        let name = resolve(&config.profile)?;
        let _guard = self.lock(&name)?;

        let config = ProfileConfig {
            profile: name.clone(),
            ..config
        }
        .with_defaults();
        debug!(profile = %name, ?config, "Merged start config");

        self.deps
            .ensure_vm_toolchain()
            .await
            .map_err(|fault| match fault {
                Fault::Cancelled { .. } => Fault::Cancelled {
                    operation: "start".to_string(),
                    profile: name.clone(),
                },
                fault => fault,
            })?;

        info!(
            profile = %name,
            cpus = config.cpus,
            memory = config.memory,
            disk = config.disk_size,
            kubernetes = config.kubernetes,
            "Starting profile"
        );
        self.vm
            .start(&config)
            .await
            .map_err(|e| command_fault("start", &name, e))?;
        info!(profile = %name, "Profile started");
        Ok(())
    }

    /// Stop a profile, then its background daemon. A daemon-stop failure is
    /// logged and does not change the result.
    pub async fn stop(&self, profile: &str) -> FaultResult<()> {
        let name = resolve(profile)?;

        let result = {
            let _guard = self.lock(&name)?;
            self.require_exists(&name)?;
            info!(profile = %name, "Stopping profile");
            self.vm
                .stop(&name)
                .await
                .map_err(|e| command_fault("stop", &name, e))
        };

        if !matches!(result, Err(Fault::Cancelled { .. })) {
            if let Err(e) = self.vm.stop_daemon(&name).await {
                warn!(profile = %name, error = %e, "Failed to stop profile daemon");
            }
        }

        if result.is_ok() {
            info!(profile = %name, "Profile stopped");
        }
        result
    }

    /// Probe and classify a profile's state. Never takes the lock.
    pub async fn status(&self, profile: &str) -> FaultResult<ProfileStatus> {
        let name = resolve(profile)?;

        let exists = self.exists(&name);
        if !exists {
            return classify(ProbeInput {
                profile: &name,
                exists,
                output: "",
                success: false,
            });
        }

        let out = self
            .vm
            .probe_status(&name)
            .await
            .map_err(|e| command_fault("status", &name, e))?;
        let output = out.combined();
        debug!(profile = %name, success = out.success, output = %output.trim(), "Status probe");

        classify(ProbeInput {
            profile: &name,
            exists,
            output: &output,
            success: out.success,
        })
    }

    /// Kubernetes credentials for a profile. Never takes the lock.
    pub async fn kubeconfig(&self, profile: &str) -> FaultResult<String> {
        let name = resolve(profile)?;
        self.require_exists(&name)?;
        self.vm
            .read_credentials(&name)
            .await
            .map_err(|e| command_fault("kubeconfig", &name, e))
    }

    /// Delete one profile or all of them, including on-disk state.
    ///
    /// Stopping first is best effort since the VM may already be down. A
    /// delete failure aborts before any directory is removed.
    pub async fn clean(&self, target: CleanTarget) -> FaultResult<()> {
        match target {
            CleanTarget::Profile(profile) => self.clean_profile(&profile).await,
            CleanTarget::All => self.clean_all().await,
        }
    }

    async fn clean_profile(&self, profile: &str) -> FaultResult<()> {
        let name = resolve(profile)?;
        let _guard = self.lock(&name)?;
        self.require_exists(&name)?;

        info!(profile = %name, "Cleaning profile");
        if let Err(e) = self.vm.stop(&name).await {
            if e.is_cancelled() {
                return Err(command_fault("clean", &name, e));
            }
            warn!(profile = %name, error = %e, "Stop before delete failed, continuing");
        }
        self.vm
            .delete(&name)
            .await
            .map_err(|e| command_fault("delete", &name, e))?;

        for dir in self.layout.profile_dirs(&name) {
            self.store.remove_dir_all(&dir).await.map_err(|e| {
                Fault::vm_manager(
                    "clean",
                    &name,
                    format!("failed to remove {}: {}", dir.display(), e),
                )
            })?;
        }
        info!(profile = %name, "Profile cleaned");
        Ok(())
    }

    async fn clean_all(&self) -> FaultResult<()> {
        let _guard = self.lock(ALL_PROFILES)?;

        info!("Cleaning all profiles");
        if let Err(e) = self.vm.stop_all().await {
            if e.is_cancelled() {
                return Err(command_fault("clean", ALL_PROFILES, e));
            }
            warn!(error = %e, "Stop all before delete failed, continuing");
        }
        self.vm
            .delete_all()
            .await
            .map_err(|e| command_fault("delete", ALL_PROFILES, e))?;

        for dir in self.layout.root_dirs() {
            self.store.remove_dir_all(&dir).await.map_err(|e| {
                Fault::vm_manager(
                    "clean",
                    ALL_PROFILES,
                    format!("failed to remove {}: {}", dir.display(), e),
                )
            })?;
        }
        info!("All profiles cleaned");
        Ok(())
    }

    pub async fn check_dependencies(&self) -> FaultResult<DependencySnapshot> {
        self.deps.check_all().await
    }

    /// Host-level upgrade. Not lock-guarded since it belongs to no profile.
    pub async fn update_dependencies(&self) -> FaultResult<()> {
        self.deps.update_all().await
    }
}
