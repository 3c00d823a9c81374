// src/exec/spawner.rs

//! Pluggable process-spawn abstraction.
//!
//! Commands talk to a [`Spawner`] instead of `tokio::process` directly. This
//! makes it easy to swap in a fake collaborator in tests while keeping the
//! production implementation in [`shell`].
//!
//! - [`ShellSpawner`] is the default implementation. It hands the expression
//!   to the platform shell and captures the full output streams.
//! - Tests can provide their own `Spawner` that, for example, records which
//!   expressions were spawned and resolves scripted outcomes on demand.
//!
//! [`shell`]: crate::exec::shell
//! [`ShellSpawner`]: crate::exec::shell::ShellSpawner

use std::future::Future;
use std::pin::Pin;

/// Terminal report of one spawned process.
///
/// Always produced exactly once per spawn, whether the process succeeded,
/// exited non-zero, or could not be started at all. A failure to spawn is
/// folded into an outcome with exit code `-1` and the OS error text in
/// `stderr`; it is never surfaced as a separate error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnOutcome {
    /// Exit code of the process; `-1` when the process was killed by a
    /// signal or could not be spawned.
    pub exit_code: i32,
    /// Full captured standard output. Empty if the stream produced no data.
    pub stdout: String,
    /// Full captured standard error. Empty if the stream produced no data.
    pub stderr: String,
}

impl SpawnOutcome {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Trait abstracting how a command expression is executed.
///
/// Contract: called at most once per `run` invocation; the returned future
/// resolves exactly once. There is no timeout; a hung process hangs its
/// command forever, since cancellation is out of scope.
pub trait Spawner: Send + Sync {
    /// Execute the given opaque shell expression and report its outcome.
    fn spawn(&self, expression: String) -> Pin<Box<dyn Future<Output = SpawnOutcome> + Send>>;
}
