use async_trait::async_trait;
use cmgr_core::deps::{BackendProbe, ToolProbe};
use tracing::{debug, info};

use crate::shell::{CommandError, Shell};
use crate::traits::DependencyChecker;

/// [`DependencyChecker`] that probes and upgrades through Homebrew.
#[derive(Debug, Clone)]
pub struct Homebrew {
    shell: Shell,
}

impl Homebrew {
    pub fn new(shell: Shell) -> Self {
        Self { shell }
    }
}

/// Version from `brew list --versions <pkg>` output (`lima 0.23.2`).
/// `None` when the package is not installed.
pub fn parse_list_versions(output: &str) -> Option<String> {
    let line = output.lines().next()?;
    let mut fields = line.split_whitespace();
    fields.next()?;
    fields.next().map(str::to_string)
}

/// First line of `colima version`, which carries the version string.
pub fn parse_tool_version(output: &str) -> String {
    output.lines().next().unwrap_or_default().trim().to_string()
}

/// A probe command that ran and failed means "absent"; only cancellation
/// is a real error.
fn absent_unless_cancelled<T: Default>(err: CommandError) -> Result<T, CommandError> {
    if err.is_cancelled() {
        return Err(err);
    }
    debug!(error = %err, "Dependency probe failed, treating as absent");
    Ok(T::default())
}

#[async_trait]
impl DependencyChecker for Homebrew {
    async fn package_manager(&self) -> Result<Option<String>, CommandError> {
        if which::which("brew").is_err() {
            return Ok(None);
        }
        match self.shell.run_stdout("brew", &["--prefix"]).await {
            Ok(prefix) => Ok(Some(prefix)),
            Err(e) => absent_unless_cancelled(e),
        }
    }

    async fn vm_tool(&self) -> Result<ToolProbe, CommandError> {
        let Ok(path) = which::which("colima") else {
            return Ok(ToolProbe::default());
        };
        match self.shell.run_stdout("colima", &["version"]).await {
            Ok(out) => Ok(ToolProbe {
                present: true,
                version: parse_tool_version(&out),
                path: path.display().to_string(),
            }),
            Err(e) => absent_unless_cancelled(e),
        }
    }

    async fn backend(&self) -> Result<BackendProbe, CommandError> {
        match self
            .shell
            .run_stdout("brew", &["list", "--versions", "lima"])
            .await
        {
            Ok(out) => Ok(match parse_list_versions(&out) {
                Some(version) => BackendProbe {
                    present: true,
                    version,
                },
                None => BackendProbe::default(),
            }),
            Err(e) => absent_unless_cancelled(e),
        }
    }

    async fn refresh(&self) -> Result<(), CommandError> {
        info!("Updating Homebrew");
        self.shell.run_checked("brew", &["update"]).await.map(|_| ())
    }

    async fn upgrade(&self) -> Result<(), CommandError> {
        info!("Upgrading colima and lima");
        self.shell
            .run_checked("brew", &["upgrade", "colima", "lima"])
            .await
            .map(|_| ())
    }
}
