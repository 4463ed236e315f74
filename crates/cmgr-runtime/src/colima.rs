use async_trait::async_trait;
use cmgr_core::layout::StateLayout;
use cmgr_core::profile::{DEFAULT_PROFILE, ProfileConfig};
use tracing::info;

use crate::shell::{CommandError, CommandOutput, Shell};
use crate::traits::VmManager;

const COLIMA: &str = "colima";

/// [`VmManager`] backed by the `colima` command line.
#[derive(Debug, Clone)]
pub struct ColimaCli {
    shell: Shell,
    layout: StateLayout,
}

impl ColimaCli {
    pub fn new(shell: Shell, layout: StateLayout) -> Self {
        Self { shell, layout }
    }
}

// ---------------------------------------------------------------------------
// Argument construction
// ---------------------------------------------------------------------------

/// `-p <profile>` for named profiles; nothing for the default profile.
pub fn profile_args(profile: &str) -> Vec<String> {
    if profile.is_empty() || profile == DEFAULT_PROFILE {
        Vec::new()
    } else {
        vec!["-p".to_string(), profile.to_string()]
    }
}

/// Arguments for `colima start` from a merged config.
pub fn start_args(config: &ProfileConfig) -> Vec<String> {
    let mut args = vec![
        "start".to_string(),
        "--cpu".to_string(),
        config.cpus.to_string(),
        "--memory".to_string(),
        config.memory.to_string(),
        "--disk".to_string(),
        config.disk_size.to_string(),
        "--vm-type".to_string(),
        config.vm_type.clone(),
        "--runtime".to_string(),
        config.runtime.clone(),
    ];
    if config.network_address {
        args.push("--network-address".to_string());
    }
    if config.kubernetes {
        args.push("--kubernetes".to_string());
    }
    args.extend(profile_args(&config.profile));
    args
}

fn with_profile(base: &[&str], profile: &str) -> Vec<String> {
    let mut args: Vec<String> = base.iter().map(|s| s.to_string()).collect();
    args.extend(profile_args(profile));
    args
}

impl ColimaCli {
    async fn run(&self, args: &[String]) -> Result<CommandOutput, CommandError> {
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.shell.run_checked(COLIMA, &refs).await
    }
}

#[async_trait]
impl VmManager for ColimaCli {
    async fn start(&self, config: &ProfileConfig) -> Result<(), CommandError> {
        info!(profile = %config.profile, "Starting colima");
        self.run(&start_args(config)).await.map(|_| ())
    }

    async fn stop(&self, profile: &str) -> Result<(), CommandError> {
        info!(profile, "Stopping colima");
        self.run(&with_profile(&["stop"], profile)).await.map(|_| ())
    }

    async fn stop_all(&self) -> Result<(), CommandError> {
        info!("Stopping all colima profiles");
        self.run(&["stop".to_string()]).await.map(|_| ())
    }

    async fn stop_daemon(&self, profile: &str) -> Result<(), CommandError> {
        let args = vec!["daemon".to_string(), "stop".to_string(), profile.to_string()];
        self.run(&args).await.map(|_| ())
    }

    async fn probe_status(&self, profile: &str) -> Result<CommandOutput, CommandError> {
        let args = with_profile(&["status", "-e"], profile);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.shell.run(COLIMA, &refs).await
    }

    async fn delete(&self, profile: &str) -> Result<(), CommandError> {
        info!(profile, "Deleting colima profile");
        let args = vec![
            "delete".to_string(),
            "-f".to_string(),
            "-p".to_string(),
            profile.to_string(),
        ];
        self.run(&args).await.map(|_| ())
    }

    async fn delete_all(&self) -> Result<(), CommandError> {
        info!("Deleting all colima profiles");
        self.run(&["delete".to_string(), "-f".to_string()])
            .await
            .map(|_| ())
    }

    async fn read_credentials(&self, profile: &str) -> Result<String, CommandError> {
        let path = self.layout.kubeconfig_path(profile);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| CommandError::Io { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_start_args_full() {
        let cfg = ProfileConfig {
            cpus: 4,
            memory: 8,
            disk_size: 60,
            vm_type: "vz".to_string(),
            runtime: "containerd".to_string(),
            network_address: true,
            kubernetes: true,
            profile: "work".to_string(),
        };
        assert_eq!(
            start_args(&cfg).join(" "),
            "start --cpu 4 --memory 8 --disk 60 --vm-type vz --runtime containerd \
             --network-address --kubernetes -p work"
        );
    }

    #[test]
    fn test_start_args_default_profile_omits_flag() {
        let cfg = ProfileConfig {
            network_address: false,
            kubernetes: false,
            ..ProfileConfig::defaults()
        };
        let args = start_args(&cfg);
        assert!(!args.contains(&"-p".to_string()));
        assert!(!args.contains(&"--kubernetes".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("containerd"));
    }

    #[test]
    fn test_profile_args() {
        assert!(profile_args("default").is_empty());
        assert!(profile_args("").is_empty());
        assert_eq!(profile_args("dev"), vec!["-p", "dev"]);
        assert_eq!(with_profile(&["status", "-e"], "dev"), vec!["status", "-e", "-p", "dev"]);
    }

    #[tokio::test]
    async fn test_read_credentials_from_layout() {
        let home = tempfile::tempdir().unwrap();
        let layout = StateLayout::new(home.path());
        std::fs::create_dir_all(layout.colima_root()).unwrap();
        std::fs::write(layout.kubeconfig_path("dev"), "apiVersion: v1\n").unwrap();

        let cli = ColimaCli::new(Shell::default(), layout);
        assert_eq!(cli.read_credentials("dev").await.unwrap(), "apiVersion: v1\n");

        let err = cli.read_credentials("other").await.unwrap_err();
        match err {
            CommandError::Io { path, .. } => {
                assert!(path.ends_with(Path::new(".colima/colima-other.kubeconfig")))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
