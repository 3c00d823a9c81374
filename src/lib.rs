// src/lib.rs

//! Launch external processes, capture their output and exit status
//! asynchronously, and track completion per command and across groups.
//!
//! The pieces, leaves first:
//! - [`exec`]: the process-spawn collaborator, with the [`Spawner`] trait and
//!   the production [`ShellSpawner`].
//! - [`command`]: a [`Command`] tracks one invocation, its lifecycle state,
//!   exit artifacts, and one-shot completion hooks.
//! - [`batch`]: a [`Batch`] groups commands and fires one completion
//!   event per run wave, once the last outstanding member finishes.
//! - [`registry`]: a [`Registry`] is the weaker shared-group variant,
//!   one append-only group, one recurring idle event.
//!
//! All `run` operations must be called inside a Tokio runtime; completion
//! is always delivered asynchronously through the registered hooks, never
//! from within the `run` call itself.

pub mod batch;
pub mod command;
pub mod errors;
pub mod exec;
pub mod registry;

use std::sync::Arc;

pub use batch::{Batch, BatchHook, Member};
pub use command::{Command, CommandHook, CommandState, RunHandle};
pub use errors::{CmdbatchError, Result};
pub use exec::{ShellSpawner, SpawnOutcome, Spawner};
pub use registry::{Registry, RegistryHook};

/// Shortcut for creating then running a single command.
///
/// Returns the command together with the handle of its tracking task.
pub fn run_command(
    spawner: &Arc<dyn Spawner>,
    expression: impl Into<String>,
    on_completed: impl FnOnce(&Command) + Send + 'static,
) -> Result<(Command, RunHandle)> {
    let command = Command::new(expression);
    let handle = command.run_with_callback(spawner, on_completed)?;
    Ok((command, handle))
}

/// Shortcut for creating then running a batch of commands.
///
/// `on_done` fires once, when the last member of the wave has completed.
pub fn run_batch<I, M>(
    spawner: &Arc<dyn Spawner>,
    members: I,
    on_done: impl FnOnce(&Batch) + Send + 'static,
) -> Result<(Batch, Vec<RunHandle>)>
where
    I: IntoIterator<Item = M>,
    M: Into<Member>,
{
    let batch = Batch::new(members);
    let handles = batch.run_with_callback(spawner, on_done)?;
    Ok((batch, handles))
}
