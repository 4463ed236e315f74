use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use cmgr_api::AppState;
use cmgr_core::config::{DEFAULT_CONFIG_FILE, ServiceConfig};
use cmgr_core::layout::StateLayout;
use cmgr_core::profile::{CleanTarget, ProfileConfig};
use cmgr_runtime::orchestrator::ProfileOrchestrator;
use cmgr_runtime::readiness::{ReadinessPolicy, bootstrap_profile};
use cmgr_runtime::shell::Shell;

use crate::logging::{self, LogFormat};
use crate::ui;

#[derive(Parser, Debug)]
#[command(
    name = "cmgr",
    version,
    about = "Serialized lifecycle control for Colima profiles"
)]
struct Cli {
    /// Service config file (TOML)
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log format: human or json (overrides [logging] format)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Also write daily-rolling log files to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API, bootstrapping the auto-start profile first if enabled
    Serve {
        /// Listen host (overrides [server] host)
        #[arg(long)]
        host: Option<String>,
        /// Listen port (overrides [server] port)
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },
    /// Start a profile
    Start(StartArgs),
    /// Stop a profile
    Stop(ProfileArg),
    /// Show a profile's state and resources
    Status(ProfileArg),
    /// Print a profile's Kubernetes credentials
    Kubeconfig(ProfileArg),
    /// Delete a profile, or every profile, including on-disk state
    Clean(CleanArgs),
    /// Check or update Homebrew, Colima and Lima
    Deps {
        #[command(subcommand)]
        action: DepsCmd,
    },
}

#[derive(Args, Debug)]
struct ProfileArg {
    /// Profile name
    #[arg(long, default_value = "")]
    profile: String,
}

#[derive(Args, Debug)]
struct StartArgs {
    /// Profile name
    #[arg(long, default_value = "")]
    profile: String,
    /// CPU count (default 12)
    #[arg(long)]
    cpus: Option<u32>,
    /// Memory in GiB (default 32)
    #[arg(long)]
    memory: Option<u32>,
    /// Disk size in GiB (default 100)
    #[arg(long)]
    disk: Option<u32>,
    /// VM type, e.g. vz or qemu
    #[arg(long)]
    vm_type: Option<String>,
    /// Container runtime, e.g. containerd or docker
    #[arg(long)]
    runtime: Option<String>,
    /// Give the VM a reachable network address
    #[arg(long)]
    network_address: bool,
    /// Enable Kubernetes
    #[arg(long)]
    kubernetes: bool,
    /// Wait until the profile is running (and credentials exist, with --kubernetes)
    #[arg(long)]
    wait: bool,
}

impl StartArgs {
    fn to_config(&self) -> ProfileConfig {
        ProfileConfig {
            cpus: self.cpus.unwrap_or_default(),
            memory: self.memory.unwrap_or_default(),
            disk_size: self.disk.unwrap_or_default(),
            vm_type: self.vm_type.clone().unwrap_or_default(),
            runtime: self.runtime.clone().unwrap_or_default(),
            network_address: self.network_address,
            kubernetes: self.kubernetes,
            profile: self.profile.clone(),
        }
    }
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct CleanArgs {
    /// Profile to delete
    #[arg(long)]
    profile: Option<String>,
    /// Delete every profile and the Colima/Lima state roots
    #[arg(long)]
    all: bool,
}

impl CleanArgs {
    fn target(&self) -> CleanTarget {
        match &self.profile {
            Some(p) if !self.all => CleanTarget::Profile(p.clone()),
            _ => CleanTarget::All,
        }
    }
}

#[derive(Subcommand, Debug)]
enum DepsCmd {
    /// Report installed prerequisites
    Check,
    /// Update Homebrew, then upgrade Colima and Lima
    Update,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = ServiceConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    let log_format: LogFormat = match cli.log_format.as_deref().or(config.logging.format.as_deref()) {
        Some(s) => s.parse()?,
        None => LogFormat::default(),
    };
    let log_dir = cli.log_dir.clone().or_else(|| config.logging.file_dir.clone());
    let _log_guard = logging::init(log_format, log_dir.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .with_context(|| "Failed to create tokio runtime")?;

    runtime.block_on(dispatch(cli, config))
}

async fn dispatch(cli: Cli, config: ServiceConfig) -> Result<()> {
    let cancel = CancellationToken::new();
    let layout = StateLayout::from_env()?;
    let orch = Arc::new(ProfileOrchestrator::production(
        Shell::new(cancel.clone()),
        layout,
    ));

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(orch, config, host, port, cancel).await,
        command => {
            let policy = ReadinessPolicy::from(&config.readiness);
            cancel_on_ctrl_c(&cancel, one_shot(&orch, command, &policy, &cancel, cli.json)).await
        }
    }
}

/// Every command except `serve`. Runs under [`cancel_on_ctrl_c`].
async fn one_shot(
    orch: &ProfileOrchestrator,
    command: Commands,
    policy: &ReadinessPolicy,
    cancel: &CancellationToken,
    json: bool,
) -> Result<()> {
    match command {
        Commands::Serve { .. } => anyhow::bail!("serve is not a one-shot command"),
        Commands::Start(args) => cmd_start(orch, &args, policy, cancel, json).await,
        Commands::Stop(args) => {
            orch.stop(&args.profile).await?;
            report(json, "stopped", &format!("Profile {} stopped", display_name(&args.profile)))
        }
        Commands::Status(args) => {
            let status = orch.status(&args.profile).await?;
            if json {
                ui::json(&status)
            } else {
                ui::profile_status(&status);
                Ok(())
            }
        }
        Commands::Kubeconfig(args) => {
            let kubeconfig = orch.kubeconfig(&args.profile).await?;
            if json {
                ui::json(&serde_json::json!({ "kubeconfig": kubeconfig }))
            } else {
                print!("{}", kubeconfig);
                Ok(())
            }
        }
        Commands::Clean(args) => {
            let target = args.target();
            let message = match &target {
                CleanTarget::All => "All profiles cleaned".to_string(),
                CleanTarget::Profile(p) => format!("Profile {} cleaned", p),
            };
            orch.clean(target).await?;
            report(json, "cleaned", &message)
        }
        Commands::Deps { action: DepsCmd::Check } => {
            let snapshot = orch.check_dependencies().await?;
            if json {
                ui::json(&snapshot)
            } else {
                ui::dependencies(&snapshot);
                if !snapshot.vm_ready() {
                    ui::warn(&format!(
                        "Missing: {} (run 'cmgr deps update')",
                        snapshot.missing().join(", ")
                    ));
                }
                Ok(())
            }
        }
        Commands::Deps { action: DepsCmd::Update } => {
            orch.update_dependencies().await?;
            report(json, "dependencies updated", "Dependencies updated")
        }
    }
}

fn display_name(profile: &str) -> &str {
    cmgr_core::profile::profile_or_default(profile)
}

fn report(json: bool, status: &str, message: &str) -> Result<()> {
    if json {
        ui::json(&serde_json::json!({ "status": status }))
    } else {
        ui::success(message);
        Ok(())
    }
}

/// Run `fut`, cancelling `cancel` on Ctrl-C so subprocesses are killed and
/// the operation returns a `Cancelled` fault instead of leaving them behind.
async fn cancel_on_ctrl_c<F>(cancel: &CancellationToken, fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let token = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received ctrl-c, cancelling");
            token.cancel();
        }
    });
    let result = fut.await;
    watcher.abort();
    result
}

async fn cmd_start(
    orch: &ProfileOrchestrator,
    args: &StartArgs,
    policy: &ReadinessPolicy,
    cancel: &CancellationToken,
    json: bool,
) -> Result<()> {
    let config = args.to_config();
    let name = display_name(&args.profile).to_string();

    if !args.wait {
        orch.start(config).await?;
        return report(json, "started", &format!("Profile {} started", name));
    }

    let status = bootstrap_profile(orch, config, policy, cancel).await?;
    if json {
        ui::json(&status)
    } else {
        ui::success(&format!("Profile {} is running", name));
        ui::profile_status(&status);
        Ok(())
    }
}

async fn cmd_serve(
    orch: Arc<ProfileOrchestrator>,
    mut config: ServiceConfig,
    host: Option<String>,
    port: Option<u16>,
    cancel: CancellationToken,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        anyhow::ensure!(port != 0, "--port must be non-zero");
        config.server.port = port;
    }

    if config.server.auto.enabled {
        let profile = config.auto_start_profile();
        let policy = ReadinessPolicy::from(&config.readiness);
        info!(profile = %profile.profile, "Auto-start enabled");
        cancel_on_ctrl_c(&cancel, async {
            bootstrap_profile(&orch, profile, &policy, &cancel)
                .await
                .with_context(|| "Auto-start bootstrap failed")?;
            Ok(())
        })
        .await?;
    }

    let addr = config.listen_addr();
    serve_until_shutdown(AppState::new(orch), &addr, &config.server.pid_file, cancel).await
}

async fn serve_until_shutdown(
    state: AppState,
    addr: &str,
    pid_file: &Path,
    cancel: CancellationToken,
) -> Result<()> {
    ui::info(&format!("Serving on http://{}", addr));
    cmgr_api::serve(state, addr, pid_file, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_start_args_map_to_config() {
        let cli = Cli::try_parse_from([
            "cmgr",
            "start",
            "--profile",
            "work",
            "--cpus",
            "4",
            "--memory",
            "8",
            "--vm-type",
            "qemu",
            "--kubernetes",
        ])
        .unwrap();
        let Commands::Start(args) = cli.command else {
            panic!("expected start");
        };
        let config = args.to_config();
        assert_eq!(config.profile, "work");
        assert_eq!(config.cpus, 4);
        assert_eq!(config.memory, 8);
        assert_eq!(config.disk_size, 0);
        assert_eq!(config.vm_type, "qemu");
        assert_eq!(config.runtime, "");
        assert!(config.kubernetes);
        assert!(!config.network_address);
        assert!(!args.wait);
    }

    #[test]
    fn test_clean_requires_target() {
        assert!(Cli::try_parse_from(["cmgr", "clean"]).is_err());
        assert!(Cli::try_parse_from(["cmgr", "clean", "--all", "--profile", "dev"]).is_err());

        let cli = Cli::try_parse_from(["cmgr", "clean", "--profile", "dev"]).unwrap();
        let Commands::Clean(args) = cli.command else {
            panic!("expected clean");
        };
        assert_eq!(args.target(), CleanTarget::Profile("dev".to_string()));

        let cli = Cli::try_parse_from(["cmgr", "clean", "--all"]).unwrap();
        let Commands::Clean(args) = cli.command else {
            panic!("expected clean");
        };
        assert_eq!(args.target(), CleanTarget::All);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "cmgr", "status", "--profile", "dev", "--json", "--config", "alt.toml",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
    }

    #[tokio::test]
    async fn test_cancel_on_ctrl_c_returns_command_result() {
        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(&cancel, async { Ok(()) }).await.unwrap();

        let err = cancel_on_ctrl_c(&cancel, async { anyhow::bail!("profile busy") })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "profile busy");
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from(["cmgr", "serve", "--host", "0.0.0.0", "-p", "9000"]).unwrap();
        let Commands::Serve { host, port } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(host.as_deref(), Some("0.0.0.0"));
        assert_eq!(port, Some(9000));
    }
}
