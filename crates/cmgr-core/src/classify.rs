//! Maps raw status-probe output onto a [`ProfileStatus`] or a [`Fault`].
//!
//! The VM manager reports state only as free text, so the matching rules
//! below are the single place that knows its wording. Rules are ordered and
//! the first match wins.

use crate::error::Fault;
use crate::profile::{ProfileState, ProfileStatus};

/// Everything the classifier needs from one status probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeInput<'a> {
    pub profile: &'a str,
    /// Whether the profile's local state directory exists.
    pub exists: bool,
    /// Combined stdout/stderr of the probe.
    pub output: &'a str,
    /// Whether the probe exited with status zero.
    pub success: bool,
}

/// Classify a status probe. Pure: same input, same result.
pub fn classify(input: ProbeInput<'_>) -> Result<ProfileStatus, Fault> {
    let profile = input.profile.to_string();

    if !input.exists {
        return Err(Fault::ProfileNotFound { profile });
    }

    if !input.success {
        let out = input.output;
        if out.contains("is not running") {
            return Err(Fault::ProfileNotStarted { profile });
        }
        if out.contains("connection refused") || out.contains("cannot connect") {
            return Err(Fault::ProfileUnreachable {
                profile,
                reason: "connection to VM failed".to_string(),
            });
        }
        return Err(Fault::ProfileMalfunctioning {
            profile,
            reason: out.to_string(),
        });
    }

    Ok(parse_status(input.profile, input.output))
}

/// Fault-free state implied by a fault, for callers that want a flat view.
pub fn state_of(fault: &Fault) -> Option<ProfileState> {
    match fault {
        Fault::ProfileNotFound { .. } => Some(ProfileState::NotFound),
        Fault::ProfileNotStarted { .. } => Some(ProfileState::NotStarted),
        Fault::ProfileUnreachable { .. } => Some(ProfileState::Unreachable),
        Fault::ProfileMalfunctioning { .. } => Some(ProfileState::Malfunctioning),
        _ => None,
    }
}

/// Scan a successful probe line by line. Unmatched fields stay zero/false,
/// and output without a "running" line is reported as still starting.
fn parse_status(profile: &str, output: &str) -> ProfileStatus {
    let mut status = ProfileStatus::empty(profile, ProfileState::Starting);

    for line in output.lines() {
        let line = line.trim_start();
        if line.contains("running") {
            status.state = ProfileState::Running;
        }
        if let Some(n) = field_value(line, "CPU:") {
            status.cpus = n;
        }
        if let Some(n) = field_value(line, "Memory:") {
            status.memory = n;
        }
        if let Some(n) = field_value(line, "Disk:") {
            status.disk_size = n;
        }
        if line.contains("kubernetes") {
            status.kubernetes = true;
        }
    }

    status
}

/// `"CPU: 4GiB"` with marker `"CPU:"` yields `Some(4)`.
fn field_value(line: &str, marker: &str) -> Option<u32> {
    let rest = line.strip_prefix(marker)?.trim_start();
    let digits: &str = &rest[..rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len())];
    digits.parse().ok()
}
