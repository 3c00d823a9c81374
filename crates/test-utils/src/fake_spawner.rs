use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use cmdbatch::exec::{SpawnOutcome, Spawner};

/// A fake process-spawn collaborator that:
/// - records which expressions were "spawned"
/// - resolves a scripted outcome per expression (success with empty output
///   by default)
/// - can hold an expression's completion until the test releases it, which
///   makes completion order fully deterministic.
#[derive(Default)]
pub struct FakeSpawner {
    outcomes: Mutex<HashMap<String, SpawnOutcome>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    spawned: Mutex<Vec<String>>,
}

impl FakeSpawner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the outcome resolved for `expression`.
    pub fn set_outcome(&self, expression: &str, outcome: SpawnOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(expression.to_string(), outcome);
    }

    /// Script a successful outcome with the given stdout.
    pub fn succeed(&self, expression: &str, stdout: &str) {
        self.set_outcome(
            expression,
            SpawnOutcome {
                exit_code: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
    }

    /// Script a failing outcome with the given exit code and stderr.
    pub fn fail(&self, expression: &str, exit_code: i32, stderr: &str) {
        self.set_outcome(
            expression,
            SpawnOutcome {
                exit_code,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        );
    }

    /// Hold completions of `expression` until [`release`] is called.
    ///
    /// [`release`]: FakeSpawner::release
    pub fn hold(&self, expression: &str) {
        self.gates
            .lock()
            .unwrap()
            .entry(expression.to_string())
            .or_insert_with(|| Arc::new(Notify::new()));
    }

    /// Release one held completion of `expression`.
    ///
    /// Releasing before the spawn is in flight is fine: `Notify` stores the
    /// permit.
    pub fn release(&self, expression: &str) {
        if let Some(gate) = self.gates.lock().unwrap().get(expression) {
            gate.notify_one();
        }
    }

    /// The expressions spawned so far, in spawn order.
    pub fn spawned(&self) -> Vec<String> {
        self.spawned.lock().unwrap().clone()
    }
}

impl Spawner for FakeSpawner {
    fn spawn(&self, expression: String) -> Pin<Box<dyn Future<Output = SpawnOutcome> + Send>> {
        self.spawned.lock().unwrap().push(expression.clone());

        let gate = self.gates.lock().unwrap().get(&expression).cloned();
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(&expression)
            .cloned()
            .unwrap_or(SpawnOutcome {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            });

        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            outcome
        })
    }
}
