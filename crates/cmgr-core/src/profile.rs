use serde::{Deserialize, Serialize};

/// Profile name used when a caller omits one.
pub const DEFAULT_PROFILE: &str = "default";

pub const DEFAULT_CPUS: u32 = 12;
pub const DEFAULT_MEMORY_GB: u32 = 32;
pub const DEFAULT_DISK_GB: u32 = 100;
pub const DEFAULT_VM_TYPE: &str = "vz";
pub const DEFAULT_RUNTIME: &str = "containerd";

/// Configuration for starting a profile.
///
/// Zero numbers and empty strings mean "unset" and are replaced by
/// [`ProfileConfig::with_defaults`]. Booleans are always taken as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub cpus: u32,
    /// Memory size in GiB.
    #[serde(default)]
    pub memory: u32,
    /// Disk size in GiB.
    #[serde(default)]
    pub disk_size: u32,
    /// VM backend, e.g. "vz" or "qemu".
    #[serde(default)]
    pub vm_type: String,
    /// Container runtime, e.g. "containerd" or "docker".
    #[serde(default)]
    pub runtime: String,
    #[serde(default)]
    pub network_address: bool,
    #[serde(default)]
    pub kubernetes: bool,
    #[serde(default)]
    pub profile: String,
}

impl ProfileConfig {
    /// The fixed default set used to fill unset fields.
    pub fn defaults() -> Self {
        Self {
            cpus: DEFAULT_CPUS,
            memory: DEFAULT_MEMORY_GB,
            disk_size: DEFAULT_DISK_GB,
            vm_type: DEFAULT_VM_TYPE.to_string(),
            runtime: DEFAULT_RUNTIME.to_string(),
            network_address: true,
            kubernetes: true,
            profile: DEFAULT_PROFILE.to_string(),
        }
    }

    /// Replace every zero/empty field with its default. Booleans are kept.
    pub fn with_defaults(mut self) -> Self {
        let d = Self::defaults();
        if self.profile.is_empty() {
            self.profile = d.profile;
        }
        if self.cpus == 0 {
            self.cpus = d.cpus;
        }
        if self.memory == 0 {
            self.memory = d.memory;
        }
        if self.disk_size == 0 {
            self.disk_size = d.disk_size;
        }
        if self.vm_type.is_empty() {
            self.vm_type = d.vm_type;
        }
        if self.runtime.is_empty() {
            self.runtime = d.runtime;
        }
        self
    }
}

/// Resolve an optional/empty profile name to the default profile.
pub fn profile_or_default(name: &str) -> &str {
    if name.is_empty() { DEFAULT_PROFILE } else { name }
}

/// Profile state derived from a single status probe. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileState {
    Running,
    Starting,
    NotStarted,
    NotFound,
    Unreachable,
    Malfunctioning,
}

impl std::fmt::Display for ProfileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Starting => write!(f, "starting"),
            Self::NotStarted => write!(f, "not_started"),
            Self::NotFound => write!(f, "not_found"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::Malfunctioning => write!(f, "malfunctioning"),
        }
    }
}

/// Result of a successful status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStatus {
    #[serde(rename = "status")]
    pub state: ProfileState,
    pub cpus: u32,
    pub memory: u32,
    pub disk_size: u32,
    pub kubernetes: bool,
    pub profile: String,
}

impl ProfileStatus {
    /// An empty status for `profile` in the given state.
    pub fn empty(profile: &str, state: ProfileState) -> Self {
        Self {
            state,
            cpus: 0,
            memory: 0,
            disk_size: 0,
            kubernetes: false,
            profile: profile.to_string(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == ProfileState::Running
    }
}

/// Which profiles a Clean operation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanTarget {
    Profile(String),
    All,
}

impl CleanTarget {
    /// An empty name selects every profile.
    pub fn from_name(name: &str) -> Self {
        if name.is_empty() {
            Self::All
        } else {
            Self::Profile(name.to_string())
        }
    }
}

/// Body of a clean request. An empty profile means clean all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanRequest {
    #[serde(default)]
    pub profile: String,
}

impl CleanRequest {
    pub fn target(&self) -> CleanTarget {
        CleanTarget::from_name(&self.profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_zero_config() {
        let cfg = ProfileConfig {
            profile: "x".to_string(),
            ..Default::default()
        }
        .with_defaults();

        let expected = ProfileConfig {
            profile: "x".to_string(),
            network_address: false,
            kubernetes: false,
            ..ProfileConfig::defaults()
        };
        assert_eq!(cfg, expected);
    }

    #[test]
    fn test_defaults_keep_explicit_values() {
        let cfg = ProfileConfig {
            cpus: 2,
            memory: 4,
            disk_size: 20,
            vm_type: "qemu".to_string(),
            runtime: "docker".to_string(),
            network_address: true,
            kubernetes: false,
            profile: "".to_string(),
        }
        .with_defaults();

        assert_eq!(cfg.cpus, 2);
        assert_eq!(cfg.memory, 4);
        assert_eq!(cfg.disk_size, 20);
        assert_eq!(cfg.vm_type, "qemu");
        assert_eq!(cfg.runtime, "docker");
        assert!(cfg.network_address);
        assert!(!cfg.kubernetes);
        assert_eq!(cfg.profile, DEFAULT_PROFILE);
    }

    #[test]
    fn test_config_deserializes_partial_json() {
        let cfg: ProfileConfig = serde_json::from_str(r#"{"cpus": 6, "profile": "work"}"#).unwrap();
        assert_eq!(cfg.cpus, 6);
        assert_eq!(cfg.profile, "work");
        assert_eq!(cfg.memory, 0);
        assert!(!cfg.kubernetes);
    }

    #[test]
    fn test_status_serializes_state_as_status() {
        let status = ProfileStatus {
            state: ProfileState::Running,
            cpus: 4,
            memory: 8,
            disk_size: 60,
            kubernetes: true,
            profile: "default".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["disk_size"], 60);
    }

    #[test]
    fn test_clean_target() {
        assert_eq!(CleanTarget::from_name(""), CleanTarget::All);
        assert_eq!(
            CleanRequest {
                profile: "dev".to_string()
            }
            .target(),
            CleanTarget::Profile("dev".to_string())
        );
    }

    #[test]
    fn test_profile_or_default() {
        assert_eq!(profile_or_default(""), "default");
        assert_eq!(profile_or_default("work"), "work");
    }
}
