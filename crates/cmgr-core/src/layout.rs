use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::profile::DEFAULT_PROFILE;

/// On-disk locations of the VM manager's state.
///
/// `~/.colima/<profile>` exists exactly when the profile has been created;
/// `~/.lima/<profile>` holds the backend's per-VM files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    colima_root: PathBuf,
    lima_root: PathBuf,
}

impl StateLayout {
    pub fn new(home: &Path) -> Self {
        Self {
            colima_root: home.join(".colima"),
            lima_root: home.join(".lima"),
        }
    }

    /// Layout rooted at `$HOME`.
    pub fn from_env() -> Result<Self> {
        let home = std::env::var_os("HOME").context("HOME is not set")?;
        Ok(Self::new(Path::new(&home)))
    }

    pub fn colima_root(&self) -> &Path {
        &self.colima_root
    }

    pub fn lima_root(&self) -> &Path {
        &self.lima_root
    }

    /// Directory whose presence means the profile exists.
    pub fn profile_dir(&self, profile: &str) -> PathBuf {
        self.colima_root.join(profile)
    }

    /// Every directory owned by a single profile, in removal order.
    pub fn profile_dirs(&self, profile: &str) -> [PathBuf; 2] {
        [self.colima_root.join(profile), self.lima_root.join(profile)]
    }

    /// Every state root, in removal order.
    pub fn root_dirs(&self) -> [PathBuf; 2] {
        [self.colima_root.clone(), self.lima_root.clone()]
    }

    /// Kubeconfig written by the VM manager for a Kubernetes-enabled profile.
    pub fn kubeconfig_path(&self, profile: &str) -> PathBuf {
        let name = if profile.is_empty() || profile == DEFAULT_PROFILE {
            "colima.kubeconfig".to_string()
        } else {
            format!("colima-{}.kubeconfig", profile)
        };
        self.colima_root.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_paths() {
        let layout = StateLayout::new(Path::new("/Users/me"));
        assert_eq!(layout.profile_dir("dev"), PathBuf::from("/Users/me/.colima/dev"));
        assert_eq!(
            layout.profile_dirs("dev"),
            [
                PathBuf::from("/Users/me/.colima/dev"),
                PathBuf::from("/Users/me/.lima/dev")
            ]
        );
        assert_eq!(
            layout.root_dirs(),
            [
                PathBuf::from("/Users/me/.colima"),
                PathBuf::from("/Users/me/.lima")
            ]
        );
    }

    #[test]
    fn test_kubeconfig_path() {
        let layout = StateLayout::new(Path::new("/h"));
        assert_eq!(
            layout.kubeconfig_path("default"),
            PathBuf::from("/h/.colima/colima.kubeconfig")
        );
        assert_eq!(
            layout.kubeconfig_path("work"),
            PathBuf::from("/h/.colima/colima-work.kubeconfig")
        );
    }
}
