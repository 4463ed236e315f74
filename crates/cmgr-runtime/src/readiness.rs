//! Readiness polling and the startup bootstrap sequence.

use std::time::Duration;

use cmgr_core::config::ReadinessConfig;
use cmgr_core::error::{Fault, FaultResult};
use cmgr_core::profile::{ProfileConfig, ProfileStatus, profile_or_default};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::orchestrator::ProfileOrchestrator;

/// How often and for how long to poll a starting profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self::from(&ReadinessConfig::default())
    }
}

impl From<&ReadinessConfig> for ReadinessPolicy {
    fn from(config: &ReadinessConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
        }
    }
}

fn cancelled(operation: &str, profile: &str) -> Fault {
    Fault::Cancelled {
        operation: operation.to_string(),
        profile: profile.to_string(),
    }
}

fn timed_out(profile: &str, policy: &ReadinessPolicy) -> Fault {
    Fault::StartupTimeout {
        profile: profile.to_string(),
        waited_secs: policy.timeout.as_secs(),
    }
}

/// Poll status until the profile is running.
///
/// Transient faults (not started, unreachable, still initializing) and
/// non-running states are retried every `poll_interval`. Any other fault is
/// returned as is. Gives up with `StartupTimeout` once `timeout` has passed,
/// including while a status probe is still in flight.
pub async fn wait_until_ready(
    orchestrator: &ProfileOrchestrator,
    profile: &str,
    policy: &ReadinessPolicy,
    cancel: &CancellationToken,
) -> FaultResult<ProfileStatus> {
    let name = profile_or_default(profile);
    let deadline = Instant::now() + policy.timeout;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled("readiness", name)),
            _ = tokio::time::sleep_until(deadline) => return Err(timed_out(name, policy)),
            result = orchestrator.status(name) => result,
        };

        match result {
            Ok(status) if status.is_running() => {
                info!(profile = %name, attempt, "Profile is ready");
                return Ok(status);
            }
            Ok(status) => {
                info!(profile = %name, attempt, state = %status.state, "Waiting for profile");
            }
            Err(fault) if fault.is_transient() => {
                info!(profile = %name, attempt, error = %fault, "Profile not ready yet");
            }
            Err(fault) => return Err(fault),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(timed_out(name, policy));
        }
        let pause = policy.poll_interval.min(deadline - now);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled("readiness", name)),
            _ = tokio::time::sleep(pause) => {}
        }
    }
}

/// Start a profile, wait until it is running and, when Kubernetes was
/// requested, fetch its credentials once.
pub async fn bootstrap_profile(
    orchestrator: &ProfileOrchestrator,
    config: ProfileConfig,
    policy: &ReadinessPolicy,
    cancel: &CancellationToken,
) -> FaultResult<ProfileStatus> {
    let name = profile_or_default(&config.profile).to_string();
    let kubernetes = config.kubernetes;

    info!(profile = %name, "Bootstrapping profile");
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(cancelled("start", &name)),
        result = orchestrator.start(config) => result?,
    }

    let status = wait_until_ready(orchestrator, &name, policy, cancel).await?;

    if kubernetes {
        orchestrator.kubeconfig(&name).await?;
        info!(profile = %name, "Kubernetes credentials available");
    }
    info!(profile = %name, "Bootstrap complete");
    Ok(status)
}
