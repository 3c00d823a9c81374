// src/registry.rs

//! Caller-owned shared command registry.
//!
//! Functionally a weaker sibling of [`Batch`]: every command run through a
//! [`Registry`] joins the same append-only group for the registry's whole
//! lifetime, and a single idle event fires whenever a completion leaves no
//! enrolled command Running. Because membership is never scoped or reset,
//! two unrelated groups of commands run through the same registry delay
//! each other's idle notification. That coupling is the point of this
//! composition mode; callers who want isolated group events should use
//! [`Batch`] instead.
//!
//! The original shape of this model was a process-wide implicit registry;
//! it is deliberately an explicit object here so that the shared state is
//! owned and visible at the call site.
//!
//! [`Batch`]: crate::batch::Batch

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::batch::Member;
use crate::command::{Command, CommandHook, RunHandle};
use crate::errors::{CmdbatchError, Result};
use crate::exec::Spawner;

/// One-shot idle hook. Receives the now-idle registry.
pub type RegistryHook = Box<dyn FnOnce(&Registry) + Send + 'static>;

struct RegistryState {
    /// Append-only; never scoped or reset.
    members: Vec<Command>,
    idle_hooks: Vec<RegistryHook>,
}

/// A shared, append-only group of commands with a recurring idle event.
#[derive(Clone)]
pub struct Registry {
    spawner: Arc<dyn Spawner>,
    state: Arc<Mutex<RegistryState>>,
}

impl Registry {
    /// Create an empty registry owning the given collaborator.
    pub fn new(spawner: Arc<dyn Spawner>) -> Self {
        Self {
            spawner,
            state: Arc::new(Mutex::new(RegistryState {
                members: Vec::new(),
                idle_hooks: Vec::new(),
            })),
        }
    }

    /// Normalize and enroll a member without running it; returns the
    /// enrolled command.
    pub fn enroll(&self, member: impl Into<Member>) -> Command {
        let command = member.into().into_command();
        self.lock().members.push(command.clone());
        command
    }

    /// Every command ever enrolled, in enrollment order.
    pub fn commands(&self) -> Vec<Command> {
        self.lock().members.clone()
    }

    /// The enrolled commands currently Running, in enrollment order.
    pub fn running_commands(&self) -> Vec<Command> {
        self.lock()
            .members
            .iter()
            .filter(|command| command.is_running())
            .cloned()
            .collect()
    }

    /// True when no enrolled command is Running.
    pub fn is_idle(&self) -> bool {
        !self.lock().members.iter().any(|command| command.is_running())
    }

    /// Register a one-shot hook fired the next time a completion leaves the
    /// registry idle.
    ///
    /// Idle can recur; each occurrence drains whatever hooks are pending at
    /// that moment. A hook registered while the registry is already idle
    /// waits for the end of the next wave of activity.
    pub fn on_idle(&self, hook: impl FnOnce(&Registry) + Send + 'static) {
        self.lock().idle_hooks.push(Box::new(hook));
    }

    /// Enroll and run a single member.
    ///
    /// The registry observes the run's completion; a command run directly
    /// via [`Command::run`] is not observed.
    pub fn run(&self, member: impl Into<Member>) -> Result<(Command, RunHandle)> {
        let mut state = self.lock();
        self.start_locked(&mut state, member.into(), None)
    }

    /// Enroll and run a single member, firing `on_completed` when it
    /// finishes.
    pub fn run_with_callback(
        &self,
        member: impl Into<Member>,
        on_completed: impl FnOnce(&Command) + Send + 'static,
    ) -> Result<(Command, RunHandle)> {
        let mut state = self.lock();
        self.start_locked(&mut state, member.into(), Some(Box::new(on_completed)))
    }

    /// Batch sugar: enroll and run every member, in order.
    ///
    /// This is a loop over the single-member run; the members form no
    /// dedicated group beyond the registry itself.
    pub fn run_all<I, M>(&self, members: I) -> Result<Vec<RunHandle>>
    where
        I: IntoIterator<Item = M>,
        M: Into<Member>,
    {
        let mut state = self.lock();
        members
            .into_iter()
            .map(|member| {
                self.start_locked(&mut state, member.into(), None)
                    .map(|(_, handle)| handle)
            })
            .collect()
    }

    /// Batch sugar with callbacks: `per_command` fires once per member
    /// completion, `on_idle` once when the registry next becomes idle.
    /// By the shared-group semantics, idle may be delayed by unrelated
    /// commands enrolled elsewhere.
    pub fn run_all_with_callbacks<I, M>(
        &self,
        members: I,
        per_command: impl Fn(&Command) + Send + Sync + 'static,
        on_idle: impl FnOnce(&Registry) + Send + 'static,
    ) -> Result<Vec<RunHandle>>
    where
        I: IntoIterator<Item = M>,
        M: Into<Member>,
    {
        let per_command: Arc<dyn Fn(&Command) + Send + Sync> = Arc::new(per_command);

        let mut state = self.lock();
        state.idle_hooks.push(Box::new(on_idle));

        members
            .into_iter()
            .map(|member| {
                let per_command = Arc::clone(&per_command);
                self.start_locked(
                    &mut state,
                    member.into(),
                    Some(Box::new(move |completed: &Command| per_command(completed))),
                )
                .map(|(_, handle)| handle)
            })
            .collect()
    }

    /// Enroll, subscribe the idle observer, and start one member while the
    /// registry lock is held.
    ///
    /// Holding the lock across multi-member loops keeps an early completion
    /// from scanning the registry before the remaining members are Running,
    /// mirroring the batch wave-start rule.
    fn start_locked(
        &self,
        state: &mut RegistryState,
        member: Member,
        on_completed: Option<CommandHook>,
    ) -> Result<(Command, RunHandle)> {
        let command = member.into_command();
        if command.is_running() {
            return Err(CmdbatchError::AlreadyRunning(
                command.expression().to_string(),
            ));
        }

        state.members.push(command.clone());

        if let Some(hook) = on_completed {
            command.on_completed(hook);
        }

        let registry = self.clone();
        command.on_completed(move |completed| registry.observe_completion(completed));

        let handle = command.run(&self.spawner)?;
        Ok((command, handle))
    }

    /// Snapshot check run after any observed completion: if no enrolled
    /// command is Running, drain and fire the pending idle hooks.
    fn observe_completion(&self, _completed: &Command) {
        let hooks = {
            let mut state = self.lock();
            if state.members.iter().any(|command| command.is_running()) {
                return;
            }
            std::mem::take(&mut state.idle_hooks)
        };

        if hooks.is_empty() {
            return;
        }

        debug!("registry idle");

        for hook in hooks {
            hook(self);
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().expect("registry state lock poisoned")
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Registry")
            .field("members", &state.members.len())
            .field("pending_idle_hooks", &state.idle_hooks.len())
            .finish_non_exhaustive()
    }
}
