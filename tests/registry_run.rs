// tests/registry_run.rs

use std::error::Error;
use std::sync::{Arc, Mutex};

use cmdbatch::exec::Spawner;
use cmdbatch::Registry;
use cmdbatch_test_utils::{FakeSpawner, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn unrelated_commands_share_the_idle_event() -> TestResult {
    init_tracing();

    let fake = FakeSpawner::new();
    fake.hold("first job");
    fake.hold("second job");
    let spawner: Arc<dyn Spawner> = fake.clone();
    let registry = Registry::new(spawner);

    let idle = Arc::new(Mutex::new(0));
    let counter = idle.clone();
    registry.on_idle(move |_| *counter.lock().unwrap() += 1);

    // Two logically unrelated runs; the registry couples them anyway.
    let (_, handle_a) = registry.run("first job")?;
    let (_, handle_b) = registry.run("second job")?;
    assert!(!registry.is_idle());

    fake.release("first job");
    with_timeout(handle_a.wait()).await?;

    // The second command still runs, so idle has not fired.
    assert_eq!(*idle.lock().unwrap(), 0);
    assert!(!registry.is_idle());

    fake.release("second job");
    with_timeout(handle_b.wait()).await?;

    assert_eq!(*idle.lock().unwrap(), 1);
    assert!(registry.is_idle());

    Ok(())
}

#[tokio::test]
async fn idle_recurs_per_wave_of_activity() -> TestResult {
    init_tracing();

    let fake = FakeSpawner::new();
    let spawner: Arc<dyn Spawner> = fake.clone();
    let registry = Registry::new(spawner);

    let first = Arc::new(Mutex::new(0));
    let counter = first.clone();
    registry.on_idle(move |_| *counter.lock().unwrap() += 1);

    let (_, handle) = registry.run("wave one")?;
    with_timeout(handle.wait()).await?;
    assert_eq!(*first.lock().unwrap(), 1);

    // A hook registered while idle waits for the next wave to drain.
    let second = Arc::new(Mutex::new(0));
    let counter = second.clone();
    registry.on_idle(move |_| *counter.lock().unwrap() += 1);
    assert_eq!(*second.lock().unwrap(), 0);

    let (_, handle) = registry.run("wave two")?;
    with_timeout(handle.wait()).await?;

    assert_eq!(*first.lock().unwrap(), 1);
    assert_eq!(*second.lock().unwrap(), 1);

    Ok(())
}

#[tokio::test]
async fn run_with_callback_receives_the_completed_command() -> TestResult {
    init_tracing();

    let fake = FakeSpawner::new();
    fake.succeed("report", "ready\n");
    let spawner: Arc<dyn Spawner> = fake.clone();
    let registry = Registry::new(spawner);

    let seen = Arc::new(Mutex::new(None));
    let slot = seen.clone();
    let (command, handle) = registry.run_with_callback("report", move |completed| {
        *slot.lock().unwrap() = Some((
            completed.expression().to_string(),
            completed.output().unwrap_or_default(),
        ));
    })?;
    with_timeout(handle.wait()).await?;

    assert_eq!(command.exit_code(), Some(0));
    assert_eq!(
        seen.lock().unwrap().clone(),
        Some(("report".to_string(), "ready\n".to_string()))
    );

    Ok(())
}

#[tokio::test]
async fn run_all_is_sugar_over_the_shared_group() -> TestResult {
    init_tracing();

    let fake = FakeSpawner::new();
    let spawner: Arc<dyn Spawner> = fake.clone();
    let registry = Registry::new(spawner);

    let completions = Arc::new(Mutex::new(0));
    let idle = Arc::new(Mutex::new(0));

    let per = completions.clone();
    let done = idle.clone();
    let handles = registry.run_all_with_callbacks(
        ["one", "two", "three"],
        move |_| *per.lock().unwrap() += 1,
        move |registry| {
            assert!(registry.running_commands().is_empty());
            *done.lock().unwrap() += 1;
        },
    )?;

    for handle in handles {
        with_timeout(handle.wait()).await?;
    }

    assert_eq!(*completions.lock().unwrap(), 3);
    assert_eq!(*idle.lock().unwrap(), 1);
    assert_eq!(registry.commands().len(), 3);

    Ok(())
}

#[tokio::test]
async fn enroll_appends_without_running() -> TestResult {
    init_tracing();

    let fake = FakeSpawner::new();
    let spawner: Arc<dyn Spawner> = fake.clone();
    let registry = Registry::new(spawner);

    let command = registry.enroll("later");
    assert_eq!(registry.commands().len(), 1);
    assert!(registry.is_idle());
    assert!(!command.is_running());
    assert!(fake.spawned().is_empty());

    Ok(())
}

#[tokio::test]
async fn running_commands_keeps_enrollment_order() -> TestResult {
    init_tracing();

    let fake = FakeSpawner::new();
    fake.hold("alpha");
    fake.hold("beta");
    let spawner: Arc<dyn Spawner> = fake.clone();
    let registry = Registry::new(spawner);

    let (_, handle_a) = registry.run("alpha")?;
    let (_, handle_b) = registry.run("beta")?;

    let running: Vec<String> = registry
        .running_commands()
        .iter()
        .map(|command| command.expression().to_string())
        .collect();
    assert_eq!(running, vec!["alpha".to_string(), "beta".to_string()]);

    fake.release("alpha");
    with_timeout(handle_a.wait()).await?;

    let running: Vec<String> = registry
        .running_commands()
        .iter()
        .map(|command| command.expression().to_string())
        .collect();
    assert_eq!(running, vec!["beta".to_string()]);

    fake.release("beta");
    with_timeout(handle_b.wait()).await?;
    assert!(registry.running_commands().is_empty());

    Ok(())
}
