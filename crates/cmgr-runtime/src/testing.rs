//! In-memory collaborator fakes with call recording.
//!
//! Compiled for this crate's tests and, behind the `testing` feature, for
//! downstream crates that want to drive an orchestrator without a host.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use cmgr_core::deps::{BackendProbe, ToolProbe};
use cmgr_core::profile::ProfileConfig;
use tokio::sync::{Notify, Semaphore};

use crate::shell::{CommandError, CommandOutput};
use crate::traits::{DependencyChecker, StateStore, VmManager};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn failed(program: &str, output: &str) -> CommandError {
    CommandError::Failed {
        program: program.to_string(),
        code: Some(1),
        output: output.to_string(),
    }
}

/// How a scripted operation fails.
#[derive(Debug, Clone)]
enum Failure {
    Exit(String),
    Cancelled,
    Hang,
}

fn cancelled(program: &str) -> CommandError {
    CommandError::Cancelled {
        program: program.to_string(),
    }
}

/// Handles for pausing a fake `start` midway.
#[derive(Debug, Clone)]
pub struct StartGate {
    /// Notified each time `start` is entered.
    pub entered: Arc<Notify>,
    permits: Arc<Semaphore>,
}

impl StartGate {
    fn new() -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    /// Let `n` paused (or future) starts return.
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }
}

// ---------------------------------------------------------------------------
// VM manager
// ---------------------------------------------------------------------------

/// Scripted [`VmManager`]. Operations succeed unless marked failing.
#[derive(Debug, Default)]
pub struct FakeVmManager {
    calls: Mutex<Vec<String>>,
    started: Mutex<Vec<ProfileConfig>>,
    failures: Mutex<HashMap<String, Failure>>,
    probes: Mutex<VecDeque<CommandOutput>>,
    credentials: Mutex<HashMap<String, String>>,
    gate: Mutex<Option<StartGate>>,
}

impl FakeVmManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `operation` (`start`, `stop`, `stop_all`, `stop_daemon`,
    /// `probe_status`, `delete`, `delete_all`, `read_credentials`) exit
    /// non-zero with `output`.
    pub fn failing(self, operation: &str, output: &str) -> Self {
        lock(&self.failures).insert(operation.to_string(), Failure::Exit(output.to_string()));
        self
    }

    /// Make `operation` report cancellation.
    pub fn cancelling(self, operation: &str) -> Self {
        lock(&self.failures).insert(operation.to_string(), Failure::Cancelled);
        self
    }

    /// Make `operation` never return, like a command stuck on an unresponsive VM.
    pub fn hanging(self, operation: &str) -> Self {
        lock(&self.failures).insert(operation.to_string(), Failure::Hang);
        self
    }

    /// Queue a probe result. Probes are consumed in order; the last one
    /// repeats forever.
    pub fn with_probe(self, success: bool, output: &str) -> Self {
        lock(&self.probes).push_back(CommandOutput {
            success,
            code: Some(if success { 0 } else { 1 }),
            stdout: output.to_string(),
            stderr: String::new(),
        });
        self
    }

    pub fn with_credentials(self, profile: &str, text: &str) -> Self {
        lock(&self.credentials).insert(profile.to_string(), text.to_string());
        self
    }

    /// Pause every `start` until the returned gate is released.
    pub fn gate_start(&self) -> StartGate {
        let gate = StartGate::new();
        *lock(&self.gate) = Some(gate.clone());
        gate
    }

    /// Every call, in order, as `operation` or `operation:profile`.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Configs passed to `start`, in order.
    pub fn started(&self) -> Vec<ProfileConfig> {
        lock(&self.started).clone()
    }

    pub fn count(&self, call: &str) -> usize {
        lock(&self.calls).iter().filter(|c| *c == call).count()
    }

    async fn record(&self, operation: &str, profile: Option<&str>) -> Result<(), CommandError> {
        let entry = match profile {
            Some(p) => format!("{}:{}", operation, p),
            None => operation.to_string(),
        };
        lock(&self.calls).push(entry);
        let failure = lock(&self.failures).get(operation).cloned();
        match failure {
            Some(Failure::Exit(output)) => Err(failed("colima", &output)),
            Some(Failure::Cancelled) => Err(cancelled("colima")),
            Some(Failure::Hang) => std::future::pending().await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl VmManager for FakeVmManager {
    async fn start(&self, config: &ProfileConfig) -> Result<(), CommandError> {
        lock(&self.started).push(config.clone());
        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            if let Ok(permit) = gate.permits.acquire().await {
                permit.forget();
            }
        }
        self.record("start", Some(&config.profile)).await
    }

    async fn stop(&self, profile: &str) -> Result<(), CommandError> {
        self.record("stop", Some(profile)).await
    }

    async fn stop_all(&self) -> Result<(), CommandError> {
        self.record("stop_all", None).await
    }

    async fn stop_daemon(&self, profile: &str) -> Result<(), CommandError> {
        self.record("stop_daemon", Some(profile)).await
    }

    async fn probe_status(&self, profile: &str) -> Result<CommandOutput, CommandError> {
        self.record("probe_status", Some(profile)).await?;
        let mut probes = lock(&self.probes);
        let out = if probes.len() > 1 {
            probes.pop_front()
        } else {
            probes.front().cloned()
        };
        Ok(out.unwrap_or(CommandOutput {
            success: true,
            code: Some(0),
            stdout: "colima is running\n".to_string(),
            stderr: String::new(),
        }))
    }

    async fn delete(&self, profile: &str) -> Result<(), CommandError> {
        self.record("delete", Some(profile)).await
    }

    async fn delete_all(&self) -> Result<(), CommandError> {
        self.record("delete_all", None).await
    }

    async fn read_credentials(&self, profile: &str) -> Result<String, CommandError> {
        self.record("read_credentials", Some(profile)).await?;
        lock(&self.credentials)
            .get(profile)
            .cloned()
            .ok_or_else(|| CommandError::Io {
                path: PathBuf::from(format!("colima-{}.kubeconfig", profile)),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
    }
}

// ---------------------------------------------------------------------------
// Dependency checker
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct DepsState {
    package_manager: Option<String>,
    vm_tool: ToolProbe,
    backend: BackendProbe,
    refresh_fails: bool,
    upgrade_fails: bool,
    upgrade_installs: bool,
    cancelled: bool,
}

/// Scripted [`DependencyChecker`].
#[derive(Debug, Default)]
pub struct FakeDependencies {
    state: Mutex<DepsState>,
    calls: Mutex<Vec<String>>,
}

impl FakeDependencies {
    /// A host with every prerequisite installed.
    pub fn installed() -> Self {
        let deps = Self::default();
        {
            let mut s = lock(&deps.state);
            s.package_manager = Some("/opt/homebrew".to_string());
            s.vm_tool = ToolProbe {
                present: true,
                version: "colima version 0.8.1".to_string(),
                path: "/opt/homebrew/bin/colima".to_string(),
            };
            s.backend = BackendProbe {
                present: true,
                version: "1.0.4".to_string(),
            };
        }
        deps
    }

    /// A host without the package manager.
    pub fn without_package_manager() -> Self {
        Self::default()
    }

    /// A host with the package manager but no VM tool or backend.
    pub fn missing_toolchain() -> Self {
        let deps = Self::default();
        lock(&deps.state).package_manager = Some("/opt/homebrew".to_string());
        deps
    }

    pub fn without_backend(self) -> Self {
        lock(&self.state).backend = BackendProbe::default();
        self
    }

    /// Make a successful upgrade install the VM tool and backend.
    pub fn upgrade_installs(self) -> Self {
        lock(&self.state).upgrade_installs = true;
        self
    }

    /// Make every check report that its command was cancelled.
    pub fn cancelling_checks(self) -> Self {
        lock(&self.state).cancelled = true;
        self
    }

    pub fn refresh_fails(self) -> Self {
        lock(&self.state).refresh_fails = true;
        self
    }

    pub fn upgrade_fails(self) -> Self {
        lock(&self.state).upgrade_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, call: &str) -> usize {
        lock(&self.calls).iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: &str) {
        lock(&self.calls).push(call.to_string());
    }
}

#[async_trait]
impl DependencyChecker for FakeDependencies {
    async fn package_manager(&self) -> Result<Option<String>, CommandError> {
        self.record("package_manager");
        if lock(&self.state).cancelled {
            return Err(cancelled("brew"));
        }
        Ok(lock(&self.state).package_manager.clone())
    }

    async fn vm_tool(&self) -> Result<ToolProbe, CommandError> {
        self.record("vm_tool");
        if lock(&self.state).cancelled {
            return Err(cancelled("colima"));
        }
        Ok(lock(&self.state).vm_tool.clone())
    }

    async fn backend(&self) -> Result<BackendProbe, CommandError> {
        self.record("backend");
        if lock(&self.state).cancelled {
            return Err(cancelled("brew"));
        }
        Ok(lock(&self.state).backend.clone())
    }

    async fn refresh(&self) -> Result<(), CommandError> {
        self.record("refresh");
        if lock(&self.state).refresh_fails {
            return Err(failed("brew update", "Error: Failed to update tap"));
        }
        Ok(())
    }

    async fn upgrade(&self) -> Result<(), CommandError> {
        self.record("upgrade");
        let mut s = lock(&self.state);
        if s.upgrade_fails {
            return Err(failed("brew upgrade colima lima", "Error: No available formula"));
        }
        if s.upgrade_installs {
            s.vm_tool = ToolProbe {
                present: true,
                version: "colima version 0.8.1".to_string(),
                path: "/opt/homebrew/bin/colima".to_string(),
            };
            s.backend = BackendProbe {
                present: true,
                version: "1.0.4".to_string(),
            };
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// State store
// ---------------------------------------------------------------------------

/// In-memory [`StateStore`]. Removing a directory also removes everything
/// beneath it.
#[derive(Debug, Default)]
pub struct FakeStateStore {
    dirs: Mutex<HashSet<PathBuf>>,
    fail_remove: Mutex<HashSet<PathBuf>>,
    removed: Mutex<Vec<PathBuf>>,
}

impl FakeStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(self, path: impl Into<PathBuf>) -> Self {
        lock(&self.dirs).insert(path.into());
        self
    }

    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        lock(&self.dirs).insert(path.into());
    }

    pub fn failing_remove(self, path: impl Into<PathBuf>) -> Self {
        lock(&self.fail_remove).insert(path.into());
        self
    }

    /// Paths passed to `remove_dir_all`, in order.
    pub fn removed(&self) -> Vec<PathBuf> {
        lock(&self.removed).clone()
    }
}

#[async_trait]
impl StateStore for FakeStateStore {
    fn exists(&self, path: &Path) -> bool {
        lock(&self.dirs).contains(path)
    }

    async fn remove_dir_all(&self, path: &Path) -> std::io::Result<()> {
        lock(&self.removed).push(path.to_path_buf());
        if lock(&self.fail_remove).contains(path) {
            return Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        }
        lock(&self.dirs).retain(|d| !d.starts_with(path));
        Ok(())
    }
}
