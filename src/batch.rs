// src/batch.rs

//! Explicit grouping of commands with a single group-completion event.
//!
//! A [`Batch`] subscribes to each member's completion and re-evaluates the
//! group state whenever one finishes: if no member is Running at that
//! moment, the batch's own completion event fires. The check is a snapshot
//! scan over the members, not a counter, so completions landing on the same
//! tick cannot cause a missed or duplicate firing.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::command::{Command, RunHandle};
use crate::errors::{CmdbatchError, Result};
use crate::exec::Spawner;

/// Something that can join a batch: a raw expression, or a command prepared
/// by the caller. Normalization into a [`Command`] is explicit here rather
/// than by runtime type inspection.
pub enum Member {
    Expression(String),
    Prepared(Command),
}

impl Member {
    /// Resolve into a runnable command, constructing one for a raw
    /// expression and passing a prepared command through as-is.
    pub fn into_command(self) -> Command {
        match self {
            Member::Expression(expression) => Command::new(expression),
            Member::Prepared(command) => command,
        }
    }
}

impl From<&str> for Member {
    fn from(expression: &str) -> Self {
        Member::Expression(expression.to_string())
    }
}

impl From<String> for Member {
    fn from(expression: String) -> Self {
        Member::Expression(expression)
    }
}

impl From<Command> for Member {
    fn from(command: Command) -> Self {
        Member::Prepared(command)
    }
}

/// One-shot batch-completion hook. Receives the completed batch.
pub type BatchHook = Box<dyn FnOnce(&Batch) + Send + 'static>;

type PerCommandHook = Arc<dyn Fn(&Command) + Send + Sync + 'static>;

struct BatchState {
    /// Insertion order is kept for iteration and reporting only; completion
    /// semantics do not depend on it.
    members: Vec<Command>,
    hooks: Vec<BatchHook>,
    /// Whether the current wave's completion event has fired.
    fired: bool,
}

/// A caller-defined group of commands whose collective completion is
/// reported as one event per run wave.
#[derive(Clone)]
pub struct Batch {
    state: Arc<Mutex<BatchState>>,
}

impl Batch {
    /// Create a batch from expressions, prepared commands, or a mix.
    pub fn new<I, M>(members: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Member>,
    {
        let members = members
            .into_iter()
            .map(|member| member.into().into_command())
            .collect();

        Self {
            state: Arc::new(Mutex::new(BatchState {
                members,
                hooks: Vec::new(),
                fired: false,
            })),
        }
    }

    /// Normalize and append a single member; returns the command that was
    /// actually added. Intended for growing the batch before a wave is
    /// started; adding during an in-flight wave is unsupported.
    pub fn add(&self, member: impl Into<Member>) -> Command {
        let command = member.into().into_command();
        self.lock().members.push(command.clone());
        command
    }

    /// The members of this batch, in insertion order.
    pub fn commands(&self) -> Vec<Command> {
        self.lock().members.clone()
    }

    /// The members currently Running, in insertion order.
    pub fn running_commands(&self) -> Vec<Command> {
        self.lock()
            .members
            .iter()
            .filter(|command| command.is_running())
            .cloned()
            .collect()
    }

    /// Register a one-shot hook on the batch's completion event.
    ///
    /// Same contract as [`Command::on_completed`]: hooks fire in
    /// registration order, exactly once each, and are discarded when the
    /// wave event fires.
    pub fn on_completed(&self, hook: impl FnOnce(&Batch) + Send + 'static) {
        self.lock().hooks.push(Box::new(hook));
    }

    /// Run every member of the batch.
    ///
    /// Returns the run handles in member order. Fails fast with
    /// [`CmdbatchError::AlreadyRunning`] if any member is still Running
    /// from a previous wave or an individual run.
    pub fn run(&self, spawner: &Arc<dyn Spawner>) -> Result<Vec<RunHandle>> {
        self.start_wave(spawner, None, None)
    }

    /// Run every member, firing `on_done` once when the whole wave has
    /// completed.
    pub fn run_with_callback(
        &self,
        spawner: &Arc<dyn Spawner>,
        on_done: impl FnOnce(&Batch) + Send + 'static,
    ) -> Result<Vec<RunHandle>> {
        self.start_wave(spawner, None, Some(Box::new(on_done)))
    }

    /// Run every member, firing `per_command` once per member completion
    /// and `on_done` once when the whole wave has completed.
    pub fn run_with_callbacks(
        &self,
        spawner: &Arc<dyn Spawner>,
        per_command: impl Fn(&Command) + Send + Sync + 'static,
        on_done: impl FnOnce(&Batch) + Send + 'static,
    ) -> Result<Vec<RunHandle>> {
        let per_command: PerCommandHook = Arc::new(per_command);
        self.start_wave(spawner, Some(per_command), Some(Box::new(on_done)))
    }

    /// Start one run wave.
    ///
    /// The batch mutex is held across the whole start loop: member
    /// completions that land while later members are still being started
    /// block in [`observe_completion`] until every member of the wave is
    /// Running, so the snapshot scan can never see a half-started wave.
    ///
    /// [`observe_completion`]: Batch::observe_completion
    fn start_wave(
        &self,
        spawner: &Arc<dyn Spawner>,
        per_command: Option<PerCommandHook>,
        on_done: Option<BatchHook>,
    ) -> Result<Vec<RunHandle>> {
        let mut state = self.lock();

        if let Some(running) = state.members.iter().find(|command| command.is_running()) {
            return Err(CmdbatchError::AlreadyRunning(
                running.expression().to_string(),
            ));
        }

        state.fired = false;
        if let Some(hook) = on_done {
            state.hooks.push(hook);
        }

        debug!(members = state.members.len(), "starting batch wave");

        let mut handles = Vec::with_capacity(state.members.len());
        for command in &state.members {
            if let Some(per_command) = &per_command {
                let per_command = Arc::clone(per_command);
                command.on_completed(move |completed| per_command(completed));
            }

            // Re-evaluate the group state once the member has completed.
            let batch = self.clone();
            command.on_completed(move |completed| batch.observe_completion(completed));

            handles.push(command.run(spawner)?);
        }

        Ok(handles)
    }

    /// Snapshot check run after any member completes: if the wave has not
    /// fired yet and no member is Running, fire the batch completion event
    /// exactly once and drain its hooks.
    fn observe_completion(&self, _completed: &Command) {
        let hooks = {
            let mut state = self.lock();
            if state.fired {
                return;
            }
            if state.members.iter().any(|command| command.is_running()) {
                return;
            }
            state.fired = true;
            std::mem::take(&mut state.hooks)
        };

        debug!("batch wave completed");

        for hook in hooks {
            hook(self);
        }
    }

    fn lock(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().expect("batch state lock poisoned")
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Batch")
            .field("members", &state.members.len())
            .field("fired", &state.fired)
            .finish_non_exhaustive()
    }
}
