use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::naming;
use crate::profile::{DEFAULT_PROFILE, ProfileConfig};

/// Default location of the service config, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "cmgr.toml";

/// Top-level service configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Named profile presets, used by auto-start.
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,
    #[serde(default)]
    pub auto: AutoStartConfig,
}

/// Start a profile and wait for readiness before serving requests.
#[derive(Debug, Clone, Deserialize)]
pub struct AutoStartConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Profile to bootstrap.
    #[serde(default = "default_auto_profile")]
    pub default: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_readiness_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// "human" or "json".
    #[serde(default)]
    pub format: Option<String>,
    /// Directory for daily-rolling log files. Unset disables file logging.
    #[serde(default)]
    pub file_dir: Option<PathBuf>,
}

/// Resources for a named profile preset. Unset numbers fall back to the
/// orchestrator defaults at start time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileSettings {
    #[serde(default)]
    pub cpus: u32,
    #[serde(default)]
    pub memory: u32,
    #[serde(default)]
    pub disk_size: u32,
    #[serde(default)]
    pub vm_type: String,
    #[serde(default)]
    pub runtime: String,
    #[serde(default)]
    pub network_address: bool,
    #[serde(default)]
    pub kubernetes: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_pid_file() -> PathBuf {
    PathBuf::from("/tmp/colima-manager.pid")
}
fn default_auto_profile() -> String {
    DEFAULT_PROFILE.to_string()
}
fn default_poll_interval() -> u64 {
    2
}
fn default_readiness_timeout() -> u64 {
    600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            pid_file: default_pid_file(),
            auto: AutoStartConfig::default(),
        }
    }
}

impl Default for AutoStartConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default: default_auto_profile(),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_readiness_timeout(),
        }
    }
}

impl ReadinessConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProfileSettings {
    /// Preset used when auto-start names a profile with no config entry.
    pub fn bootstrap_default() -> Self {
        Self {
            cpus: 4,
            memory: 8,
            disk_size: 60,
            vm_type: "vz".to_string(),
            runtime: "containerd".to_string(),
            network_address: true,
            kubernetes: true,
        }
    }

    pub fn to_profile_config(&self, profile: &str) -> ProfileConfig {
        ProfileConfig {
            cpus: self.cpus,
            memory: self.memory,
            disk_size: self.disk_size,
            vm_type: self.vm_type.clone(),
            runtime: self.runtime.clone(),
            network_address: self.network_address,
            kubernetes: self.kubernetes,
            profile: profile.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load config from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse config from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if self.readiness.poll_interval_secs == 0 {
            anyhow::bail!("readiness.poll_interval_secs must be non-zero");
        }
        if self.readiness.timeout_secs < self.readiness.poll_interval_secs {
            anyhow::bail!(
                "readiness.timeout_secs ({}) must be at least poll_interval_secs ({})",
                self.readiness.timeout_secs,
                self.readiness.poll_interval_secs
            );
        }
        for name in self.profiles.keys() {
            naming::validate_profile(name)
                .with_context(|| format!("Invalid [profiles.{}] entry", name))?;
        }
        if self.server.auto.enabled {
            naming::validate_profile(&self.server.auto.default)
                .with_context(|| "Invalid server.auto.default profile")?;
        }
        Ok(())
    }

    /// Start config for the auto-start profile: its preset, or the bootstrap
    /// defaults when no preset exists.
    pub fn auto_start_profile(&self) -> ProfileConfig {
        let name = if self.server.auto.default.is_empty() {
            DEFAULT_PROFILE
        } else {
            self.server.auto.default.as_str()
        };
        match self.profiles.get(name) {
            Some(settings) => settings.to_profile_config(name),
            None => {
                tracing::info!(profile = %name, "No preset for profile, using bootstrap defaults");
                ProfileSettings::bootstrap_default().to_profile_config(name)
            }
        }
    }

    /// Address the HTTP server binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config = ServiceConfig::parse("").unwrap();
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.pid_file, PathBuf::from("/tmp/colima-manager.pid"));
        assert!(!config.server.auto.enabled);
        assert_eq!(config.readiness.poll_interval_secs, 2);
        assert_eq!(config.readiness.timeout_secs, 600);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "0.0.0.0"
port = 9090
pid_file = "/var/run/cmgr.pid"

[server.auto]
enabled = true
default = "work"

[readiness]
poll_interval_secs = 1
timeout_secs = 30

[logging]
format = "json"
file_dir = "logs"

[profiles.work]
cpus = 6
memory = 12
disk_size = 80
vm_type = "qemu"
runtime = "docker"
network_address = false
kubernetes = true
"#;
        let config = ServiceConfig::parse(toml).unwrap();
        assert_eq!(config.listen_addr(), "0.0.0.0:9090");
        assert!(config.server.auto.enabled);
        assert_eq!(config.readiness.timeout(), Duration::from_secs(30));
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        assert_eq!(config.logging.file_dir, Some(PathBuf::from("logs")));

        let start = config.auto_start_profile();
        assert_eq!(start.profile, "work");
        assert_eq!(start.cpus, 6);
        assert_eq!(start.vm_type, "qemu");
        assert!(!start.network_address);
        assert!(start.kubernetes);
    }

    #[test]
    fn test_auto_start_without_preset_uses_bootstrap_defaults() {
        let toml = r#"
[server.auto]
enabled = true
default = "ci"
"#;
        let config = ServiceConfig::parse(toml).unwrap();
        let start = config.auto_start_profile();
        assert_eq!(start.profile, "ci");
        assert_eq!(start.cpus, 4);
        assert_eq!(start.memory, 8);
        assert_eq!(start.disk_size, 60);
        assert!(start.kubernetes);
    }

    #[test]
    fn test_reject_zero_port() {
        let err = ServiceConfig::parse("[server]\nport = 0\n").unwrap_err();
        assert!(format!("{}", err).contains("port"));
    }

    #[test]
    fn test_reject_timeout_below_interval() {
        let toml = "[readiness]\npoll_interval_secs = 5\ntimeout_secs = 1\n";
        let err = ServiceConfig::parse(toml).unwrap_err();
        assert!(format!("{}", err).contains("at least"));
    }

    #[test]
    fn test_reject_bad_profile_key() {
        let toml = "[profiles.\"../etc\"]\ncpus = 2\n";
        let err = ServiceConfig::parse(toml).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid [profiles."));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmgr.toml");
        std::fs::write(&path, "[server]\nport = 7000\n").unwrap();
        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.server.port, 7000);
    }
}
