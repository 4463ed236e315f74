use thiserror::Error;

/// Result type for orchestrator operations.
pub type FaultResult<T> = Result<T, Fault>;

/// Closed set of faults an orchestrator operation can return.
///
/// Every collaborator failure is wrapped into exactly one of these before it
/// leaves the orchestrator, so callers can match on the variant instead of
/// inspecting message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// No local state directory exists for the profile.
    #[error("profile '{profile}' does not exist")]
    ProfileNotFound { profile: String },

    /// The VM manager reports the profile as stopped.
    #[error("profile '{profile}' is not started")]
    ProfileNotStarted { profile: String },

    /// The probe ran but could not reach the VM.
    #[error("profile '{profile}' is unreachable: {reason}")]
    ProfileUnreachable { profile: String, reason: String },

    /// The probe failed for an unrecognized reason. `reason` is the raw probe output.
    #[error("profile '{profile}' is malfunctioning: {reason}")]
    ProfileMalfunctioning { profile: String, reason: String },

    /// Another mutating operation holds the profile lock.
    #[error("profile '{profile}' is currently busy with another operation")]
    ProfileBusy { profile: String },

    /// A prerequisite is missing or could not be upgraded.
    #[error("{dependency} dependency error: {reason}")]
    Dependency { dependency: String, reason: String },

    /// Any other external-tool failure.
    #[error("{operation} failed for profile '{profile}': {reason}")]
    VmManager {
        operation: String,
        profile: String,
        reason: String,
    },

    /// The profile did not reach Running before the readiness deadline.
    #[error("profile '{profile}' did not become ready within {waited_secs}s")]
    StartupTimeout { profile: String, waited_secs: u64 },

    /// The caller cancelled the operation while it was in flight.
    #[error("{operation} was cancelled for profile '{profile}'")]
    Cancelled { operation: String, profile: String },

    /// The profile name cannot be used as a state directory name.
    #[error("invalid profile name {profile:?}: {reason}")]
    InvalidProfile { profile: String, reason: String },
}

impl Fault {
    /// Stable snake_case tag for transport-level error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProfileNotFound { .. } => "profile_not_found",
            Self::ProfileNotStarted { .. } => "profile_not_started",
            Self::ProfileUnreachable { .. } => "profile_unreachable",
            Self::ProfileMalfunctioning { .. } => "profile_malfunctioning",
            Self::ProfileBusy { .. } => "profile_busy",
            Self::Dependency { .. } => "dependency",
            Self::VmManager { .. } => "vm_manager",
            Self::StartupTimeout { .. } => "startup_timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::InvalidProfile { .. } => "invalid_profile",
        }
    }

    /// Whether a readiness poll should retry after observing this fault.
    ///
    /// A freshly started VM passes through not-started, unreachable and
    /// half-initialized states before the probe settles, so these are
    /// retried until the deadline.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ProfileNotFound { .. }
                | Self::ProfileNotStarted { .. }
                | Self::ProfileUnreachable { .. }
                | Self::ProfileMalfunctioning { .. }
                | Self::ProfileBusy { .. }
        )
    }

    /// Profile named by this fault, if any.
    pub fn profile(&self) -> Option<&str> {
        match self {
            Self::ProfileNotFound { profile }
            | Self::ProfileNotStarted { profile }
            | Self::ProfileUnreachable { profile, .. }
            | Self::ProfileMalfunctioning { profile, .. }
            | Self::ProfileBusy { profile }
            | Self::VmManager { profile, .. }
            | Self::StartupTimeout { profile, .. }
            | Self::Cancelled { profile, .. }
            | Self::InvalidProfile { profile, .. } => Some(profile),
            Self::Dependency { .. } => None,
        }
    }

    pub fn vm_manager(operation: &str, profile: &str, reason: impl Into<String>) -> Self {
        Self::VmManager {
            operation: operation.to_string(),
            profile: profile.to_string(),
            reason: reason.into(),
        }
    }

    pub fn dependency(dependency: &str, reason: impl Into<String>) -> Self {
        Self::Dependency {
            dependency: dependency.to_string(),
            reason: reason.into(),
        }
    }
}
