use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Failure of an external command or file read performed on behalf of a
/// collaborator. Never leaves the orchestrator unwrapped.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {output}", exit_label(.code))]
    Failed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} was cancelled")]
    Cancelled { program: String },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {}", c),
        None => "signal".to_string(),
    }
}

impl CommandError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout followed by stderr, the way a terminal would interleave them
    /// for tools that write one line at a time.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// Runs host commands, killing them when the shared token is cancelled or
/// when the calling future is dropped.
#[derive(Debug, Clone, Default)]
pub struct Shell {
    cancel: CancellationToken,
}

impl Shell {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run a command to completion, capturing output. A non-zero exit is
    /// reported in the output, not as an error.
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        debug!(program, args = %args.join(" "), "Running command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let output = tokio::select! {
            result = child.wait_with_output() => result.map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?,
            _ = self.cancel.cancelled() => {
                return Err(CommandError::Cancelled {
                    program: program.to_string(),
                });
            }
        };

        let out = CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(program, success = out.success, code = ?out.code, "Command finished");
        Ok(out)
    }

    /// Run a command and fail on a non-zero exit, with combined output as
    /// the failure reason.
    pub async fn run_checked(
        &self,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput, CommandError> {
        let out = self.run(program, args).await?;
        if !out.success {
            return Err(CommandError::Failed {
                program: format!("{} {}", program, args.join(" ")),
                code: out.code,
                output: out.combined().trim().to_string(),
            });
        }
        Ok(out)
    }

    /// Run a command and return trimmed stdout on success.
    pub async fn run_stdout(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
        let out = self.run_checked(program, args).await?;
        Ok(out.stdout.trim().to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_captures_both_streams() {
        let shell = Shell::default();
        let out = shell
            .run("sh", &["-c", "echo out; echo err 1>&2; exit 3"])
            .await
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert_eq!(out.combined(), "out\nerr\n");
    }

    #[tokio::test]
    async fn test_run_checked_reports_failure() {
        let shell = Shell::default();
        let err = shell
            .run_checked("sh", &["-c", "echo boom; exit 1"])
            .await
            .unwrap_err();
        match err {
            CommandError::Failed { code, output, .. } => {
                assert_eq!(code, Some(1));
                assert_eq!(output, "boom");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_stdout_trims() {
        let shell = Shell::default();
        let out = shell.run_stdout("sh", &["-c", "echo '  v1.2.3  '"]).await.unwrap();
        assert_eq!(out, "v1.2.3");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let shell = Shell::default();
        let err = shell
            .run("cmgr-definitely-not-a-real-binary", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_cancel_kills_running_command() {
        let token = CancellationToken::new();
        let shell = Shell::new(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let started = std::time::Instant::now();
        let err = shell.run("sleep", &["30"]).await.unwrap_err();
        canceller.await.unwrap();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_combined_without_stderr() {
        let out = CommandOutput {
            success: true,
            code: Some(0),
            stdout: "running".to_string(),
            stderr: String::new(),
        };
        assert_eq!(out.combined(), "running");
    }
}
