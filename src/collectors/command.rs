use crate::collectors::SourceError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time;

/// Runs an external inventory command and hands back its stdout.
///
/// Collectors only ever see this trait, so tests can feed canned output
/// instead of spawning `zpool` or `apt`.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, SourceError>;
}

#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, SourceError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| SourceError::Unavailable {
                program: program.to_string(),
                reason: err.to_string(),
            })?;

        let output = match time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(SourceError::Unavailable {
                    program: program.to_string(),
                    reason: err.to_string(),
                })
            }
            Err(_elapsed) => {
                return Err(SourceError::Timeout {
                    program: program.to_string(),
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            let reason = match output.status.code() {
                Some(code) => format!("код выхода {code}"),
                None => "процесс завершён сигналом".to_string(),
            };
            return Err(SourceError::Unavailable {
                program: program.to_string(),
                reason,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
