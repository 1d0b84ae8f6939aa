//! Runs single commands with escalated privilege.
//!
//! The credential is handed to the escalation program on stdin exactly once.
//! It never appears on a command line and is never logged.

use std::fmt;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use crate::config::PrivilegeConfig;

/// Secret supplied by the session layer for one privileged call.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// What a privileged command produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutcome {
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    pub fn succeeded(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            ..Self::default()
        }
    }
}

/// The seam every privileged side effect goes through.
pub trait PrivilegedRunner: Send + Sync {
    /// Run `argv` once with escalated privilege. Never fails: errors and
    /// timeouts come back as an unsuccessful outcome.
    fn run(
        &self,
        argv: &[String],
        credential: &Credential,
    ) -> impl Future<Output = CommandOutcome> + Send;

    /// Upper bound on one `run`
    fn timeout(&self) -> Duration;
}

/// Escalates through `sudo -S` (or whatever program is configured).
#[derive(Debug, Clone)]
pub struct SudoRunner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl SudoRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &PrivilegeConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone(), config.timeout())
    }
}

impl PrivilegedRunner for SudoRunner {
    async fn run(&self, argv: &[String], credential: &Credential) -> CommandOutcome {
        let command_line = argv.join(" ");
        tracing::info!("Running privileged command: {}", command_line);

        let mut child = match Command::new(&self.program)
            .args(&self.args)
            .args(argv)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::error!("Failed to spawn {}: {}", self.program, e);
                return CommandOutcome::failed(format!("Failed to spawn {}: {}", self.program, e));
            }
        };

        let stdin = child.stdin.take();
        let secret = format!("{}\n", credential.expose());
        let exchange = async move {
            if let Some(mut stdin) = stdin {
                // The program may exit without reading; that is not an error here.
                if let Err(e) = stdin.write_all(secret.as_bytes()).await {
                    tracing::debug!("Credential not consumed: {}", e);
                }
                drop(stdin);
            }
            child.wait_with_output().await
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(output)) => {
                let outcome = CommandOutcome {
                    success: output.status.success(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    timed_out: false,
                };
                if !outcome.success {
                    tracing::warn!(
                        "Privileged command `{}` exited with {}: {}",
                        command_line,
                        output.status,
                        outcome.stderr.trim()
                    );
                }
                outcome
            }
            Ok(Err(e)) => {
                tracing::error!("Privileged command `{}` failed: {}", command_line, e);
                CommandOutcome::failed(e.to_string())
            }
            Err(_) => {
                // dropping the future killed the child
                tracing::error!(
                    "Privileged command `{}` timed out after {:?}",
                    command_line,
                    self.timeout
                );
                CommandOutcome {
                    timed_out: true,
                    ..CommandOutcome::failed(format!("timed out after {:?}", self.timeout))
                }
            }
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// `sh` stands in for sudo: it reads one line from stdin and only runs
    /// the trailing argv when that line is the expected secret.
    fn gatekeeper(timeout: Duration) -> SudoRunner {
        SudoRunner::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"read pw; [ "$pw" = "s3cret" ] || { echo "bad password" >&2; exit 1; }; "$@""#.to_string(),
                "sh".to_string(),
            ],
            timeout,
        )
    }

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_credential_delivered_on_stdin() {
        let runner = gatekeeper(Duration::from_secs(5));
        let outcome = runner
            .run(&argv(&["echo", "copied"]), &Credential::new("s3cret"))
            .await;
        assert!(outcome.success, "stderr: {}", outcome.stderr);
        assert_eq!(outcome.stdout.trim(), "copied");
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn test_wrong_credential_fails() {
        let runner = gatekeeper(Duration::from_secs(5));
        let outcome = runner
            .run(&argv(&["echo", "copied"]), &Credential::new("guess"))
            .await;
        assert!(!outcome.success);
        assert!(outcome.stderr.contains("bad password"));
        assert!(outcome.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_reported_as_failure() {
        let runner = gatekeeper(Duration::from_millis(200));
        let outcome = runner
            .run(&argv(&["sleep", "5"]), &Credential::new("s3cret"))
            .await;
        assert!(!outcome.success);
        assert!(outcome.timed_out);
    }

    #[tokio::test]
    async fn test_missing_program_reported_as_failure() {
        let runner = SudoRunner::new("/nonexistent/sudo", Vec::new(), Duration::from_secs(1));
        let outcome = runner.run(&argv(&["true"]), &Credential::new("x")).await;
        assert!(!outcome.success);
        assert!(outcome.stderr.contains("Failed to spawn"));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("s3cret");
        assert!(!format!("{:?}", credential).contains("s3cret"));
    }
}
