use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// PID file held for the server's lifetime and removed on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write this process's PID to `path`, refusing if the file names
    /// another live process. A stale file is overwritten.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(pid) = read_pid(path)
            && pid != std::process::id()
            && is_alive(pid)
        {
            anyhow::bail!(
                "Another instance is already running (pid {}, {})",
                pid,
                path.display()
            );
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, std::process::id().to_string())
            .with_context(|| format!("Failed to write PID file {}", path.display()))?;
        debug!(path = %path.display(), "PID file written");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "PID file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove PID file"),
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn is_alive(pid: u32) -> bool {
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run/cmgr.pid");
        {
            let pid = PidFile::create(&path).unwrap();
            assert_eq!(pid.path(), path);
            let content = fs::read_to_string(&path).unwrap();
            assert_eq!(content, std::process::id().to_string());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_stale_file_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmgr.pid");
        fs::write(&path, "not-a-pid").unwrap();
        let _pid = PidFile::create(&path).unwrap();
        assert_eq!(read_pid(&path), Some(std::process::id()));
    }

    #[cfg(unix)]
    #[test]
    fn test_live_process_refused() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmgr.pid");
        fs::write(&path, child.id().to_string()).unwrap();

        let err = PidFile::create(&path).unwrap_err();
        assert!(err.to_string().contains("already running"));

        child.kill().unwrap();
        child.wait().unwrap();
    }
}
