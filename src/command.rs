// src/command.rs

//! Single tracked invocation of an external process.
//!
//! A [`Command`] owns its lifecycle state (Pending -> Running -> Completed),
//! its exit artifacts, and a list of one-shot completion hooks. Running a
//! command never blocks and never notifies synchronously: a Tokio task
//! awaits the [`Spawner`], then performs the terminal transition and drains
//! the hooks, in registration order, as one wave.
//!
//! `Command` is a cheap clonable handle; all clones observe the same
//! lifecycle. State, artifacts and hooks live behind a single mutex so that
//! the terminal transition and the hook drain are one atomic step even when
//! completions from different commands land on different runtime threads.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::{CmdbatchError, Result};
use crate::exec::{SpawnOutcome, Spawner};

/// Lifecycle state of a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    /// Constructed, never run.
    Pending,
    /// A process is in flight for this command.
    Running,
    /// The last run terminated; exit artifacts are set.
    Completed,
}

/// One-shot completion hook. Receives the completed command.
pub type CommandHook = Box<dyn FnOnce(&Command) + Send + 'static>;

/// Mutable tracking state, one mutex per command.
struct TrackState {
    state: CommandState,
    exit_code: Option<i32>,
    output: Option<String>,
    error_output: Option<String>,
    hooks: Vec<CommandHook>,
}

struct CommandInner {
    expression: String,
    track: Mutex<TrackState>,
}

/// A single tracked invocation of an external process.
#[derive(Clone)]
pub struct Command {
    inner: Arc<CommandInner>,
}

impl Command {
    /// Create a Pending command bound to the given expression.
    ///
    /// No side effects; no process is started.
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(CommandInner {
                expression: expression.into(),
                track: Mutex::new(TrackState {
                    state: CommandState::Pending,
                    exit_code: None,
                    output: None,
                    error_output: None,
                    hooks: Vec::new(),
                }),
            }),
        }
    }

    /// The immutable expression this command runs.
    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    pub fn state(&self) -> CommandState {
        self.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == CommandState::Running
    }

    /// Exit code of the last run; `None` until completed.
    pub fn exit_code(&self) -> Option<i32> {
        self.lock().exit_code
    }

    /// Captured standard output of the last run; `None` until completed,
    /// empty string if the stream produced no data.
    pub fn output(&self) -> Option<String> {
        self.lock().output.clone()
    }

    /// Captured standard error of the last run; `None` until completed.
    pub fn error_output(&self) -> Option<String> {
        self.lock().error_output.clone()
    }

    /// Register a one-shot completion hook.
    ///
    /// Hooks fire in registration order, each exactly once, at the end of
    /// the next run to complete; the list is drained when it fires. A hook
    /// registered after a run completed stays queued for the following run.
    pub fn on_completed(&self, hook: impl FnOnce(&Command) + Send + 'static) {
        self.lock().hooks.push(Box::new(hook));
    }

    /// Start a run of this command.
    ///
    /// Transitions to Running synchronously, then spawns a tracking task
    /// that awaits the spawner and performs the completion wave. Completion
    /// is always delivered asynchronously, never from within this call.
    ///
    /// Fails fast with [`CmdbatchError::AlreadyRunning`] while a previous
    /// run is still in flight; a completed command may be run again, which
    /// resets its exit artifacts.
    pub fn run(&self, spawner: &Arc<dyn Spawner>) -> Result<RunHandle> {
        self.begin_run()?;
        Ok(self.spawn_tracker(spawner))
    }

    /// Like [`run`], additionally registering `on_completed` as a one-shot
    /// hook for this run.
    ///
    /// [`run`]: Command::run
    pub fn run_with_callback(
        &self,
        spawner: &Arc<dyn Spawner>,
        on_completed: impl FnOnce(&Command) + Send + 'static,
    ) -> Result<RunHandle> {
        self.begin_run()?;
        // Registered after the Running transition but before the tracking
        // task exists, so the hook cannot miss this run's completion.
        self.on_completed(on_completed);
        Ok(self.spawn_tracker(spawner))
    }

    /// Reject a double run, otherwise transition to Running and reset the
    /// artifacts of any previous run.
    fn begin_run(&self) -> Result<()> {
        let mut track = self.lock();
        if track.state == CommandState::Running {
            return Err(CmdbatchError::AlreadyRunning(self.inner.expression.clone()));
        }
        track.state = CommandState::Running;
        track.exit_code = None;
        track.output = None;
        track.error_output = None;
        Ok(())
    }

    fn spawn_tracker(&self, spawner: &Arc<dyn Spawner>) -> RunHandle {
        debug!(command = %self.inner.expression, "starting command");

        let spawner = Arc::clone(spawner);
        let command = self.clone();

        let tracker = tokio::spawn(async move {
            let outcome = spawner.spawn(command.inner.expression.clone()).await;
            command.complete(outcome);
        });

        RunHandle { tracker }
    }

    /// Terminal transition: set artifacts, mark Completed, and drain the
    /// hook list as one critical section; invoke the hooks afterwards, in
    /// registration order, outside the lock.
    fn complete(&self, outcome: SpawnOutcome) {
        let exit_code = outcome.exit_code;
        let hooks = {
            let mut track = self.lock();
            track.state = CommandState::Completed;
            track.exit_code = Some(outcome.exit_code);
            track.output = Some(outcome.stdout);
            track.error_output = Some(outcome.stderr);
            std::mem::take(&mut track.hooks)
        };

        info!(
            command = %self.inner.expression,
            exit_code,
            success = exit_code == 0,
            "command completed"
        );

        for hook in hooks {
            hook(self);
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackState> {
        // Hooks run outside the lock, so only a panic inside this module
        // could poison it.
        self.inner
            .track
            .lock()
            .expect("command track lock poisoned")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.expression)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("expression", &self.inner.expression)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Handle to the tracking task of one run.
///
/// Awaiting it resolves once the run has completed *and* every completion
/// hook of that run has returned, which makes it a convenient join point
/// for callers and tests.
#[derive(Debug)]
pub struct RunHandle {
    tracker: JoinHandle<()>,
}

impl RunHandle {
    /// Wait for the run (including its completion wave) to finish.
    pub async fn wait(self) -> Result<()> {
        self.tracker.await?;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.tracker.is_finished()
    }
}
