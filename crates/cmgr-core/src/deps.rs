use serde::{Deserialize, Serialize};

/// Dependency name reported when the package manager is absent.
pub const PACKAGE_MANAGER: &str = "homebrew";
/// Dependency name reported for VM tool / backend failures.
pub const VM_TOOLCHAIN: &str = "colima/lima";

/// Point-in-time view of the host prerequisites. Recomputed on every check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySnapshot {
    /// Package manager (Homebrew) present.
    pub homebrew: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub homebrew_path: String,
    /// VM tool (colima) present.
    pub colima: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub colima_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub colima_path: String,
    /// Virtualization backend (lima) present.
    pub lima: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lima_version: String,
}

impl DependencySnapshot {
    /// Both the VM tool and the backend are installed.
    pub fn vm_ready(&self) -> bool {
        self.colima && self.lima
    }

    /// Names of missing components other than the package manager.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.colima {
            missing.push("colima");
        }
        if !self.lima {
            missing.push("lima");
        }
        missing
    }
}

/// Result of probing the VM tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolProbe {
    pub present: bool,
    pub version: String,
    pub path: String,
}

/// Result of probing the virtualization backend package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendProbe {
    pub present: bool,
    pub version: String,
}
