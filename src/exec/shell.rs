// src/exec/shell.rs

//! Shell-backed [`Spawner`] implementation.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, error, info};

use super::spawner::{SpawnOutcome, Spawner};

/// Production spawner that runs expressions through the platform shell
/// (`sh -c` on Unix, `cmd /C` on Windows) and captures the full stdout and
/// stderr streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellSpawner;

impl ShellSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl Spawner for ShellSpawner {
    fn spawn(&self, expression: String) -> Pin<Box<dyn Future<Output = SpawnOutcome> + Send>> {
        Box::pin(async move {
            debug!(command = %expression, "spawning shell process");

            // Build a shell command appropriate for the platform.
            let mut cmd = if cfg!(windows) {
                let mut c = Command::new("cmd");
                c.arg("/C").arg(&expression);
                c
            } else {
                let mut c = Command::new("sh");
                c.arg("-c").arg(&expression);
                c
            };

            // Keep the child detached from our stdin; `output()` pipes and
            // collects both output streams.
            cmd.stdin(Stdio::null()).kill_on_drop(true);

            match cmd.output().await {
                Ok(out) => {
                    let exit_code = out.status.code().unwrap_or(-1);
                    info!(
                        command = %expression,
                        exit_code,
                        success = out.status.success(),
                        "shell process exited"
                    );
                    SpawnOutcome {
                        exit_code,
                        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                    }
                }
                Err(err) => {
                    // Spawn failures travel down the normal completion path
                    // as a failed outcome, never as a distinct error.
                    error!(command = %expression, error = %err, "failed to spawn shell process");
                    SpawnOutcome {
                        exit_code: -1,
                        stdout: String::new(),
                        stderr: err.to_string(),
                    }
                }
            }
        })
    }
}
