// tests/shell_spawner.rs

//! End-to-end tests against real processes through the platform shell.

#![cfg(unix)]

use std::error::Error;
use std::io::Write;
use std::sync::{Arc, Mutex};

use cmdbatch::exec::{ShellSpawner, Spawner};
use cmdbatch::{Batch, run_batch, run_command};
use cmdbatch_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn shell() -> Arc<dyn Spawner> {
    Arc::new(ShellSpawner::new())
}

#[tokio::test]
async fn true_and_false_complete_with_their_exit_codes() -> TestResult {
    init_tracing();

    let spawner = shell();
    let batch = Batch::new(["true", "false"]);

    let exit_codes = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(Mutex::new(0));

    let seen = exit_codes.clone();
    let counter = done.clone();
    let handles = batch.run_with_callbacks(
        &spawner,
        move |completed| {
            seen.lock().unwrap().push((
                completed.expression().to_string(),
                completed.exit_code().expect("completed member has a code"),
            ));
        },
        move |completed| {
            assert!(completed.running_commands().is_empty());
            *counter.lock().unwrap() += 1;
        },
    )?;

    for handle in handles {
        with_timeout(handle.wait()).await?;
    }

    let mut exit_codes = exit_codes.lock().unwrap().clone();
    exit_codes.sort();
    assert_eq!(exit_codes[0].0, "false");
    assert_ne!(exit_codes[0].1, 0);
    assert_eq!(exit_codes[1], ("true".to_string(), 0));
    assert_eq!(*done.lock().unwrap(), 1);

    Ok(())
}

#[tokio::test]
async fn stdout_is_captured_in_full() -> TestResult {
    init_tracing();

    let spawner = shell();
    let (command, handle) = run_command(&spawner, "echo hello", |_| {})?;
    with_timeout(handle.wait()).await?;

    assert_eq!(command.exit_code(), Some(0));
    assert_eq!(command.output().as_deref(), Some("hello\n"));
    assert_eq!(command.error_output().as_deref(), Some(""));

    Ok(())
}

#[tokio::test]
async fn stderr_is_captured_separately() -> TestResult {
    init_tracing();

    let spawner = shell();
    let (command, handle) = run_command(&spawner, "echo oops 1>&2", |_| {})?;
    with_timeout(handle.wait()).await?;

    assert_eq!(command.exit_code(), Some(0));
    assert_eq!(command.output().as_deref(), Some(""));
    assert_eq!(command.error_output().as_deref(), Some("oops\n"));

    Ok(())
}

#[tokio::test]
async fn missing_program_completes_with_failure_data() -> TestResult {
    init_tracing();

    let spawner = shell();
    let (command, handle) = run_command(
        &spawner,
        "this-program-definitely-does-not-exist-7f3a",
        |_| {},
    )?;
    with_timeout(handle.wait()).await?;

    // The shell reports "command not found"; no error is raised.
    let exit_code = command.exit_code().expect("completed with a code");
    assert_ne!(exit_code, 0);
    assert!(!command.error_output().unwrap_or_default().is_empty());

    Ok(())
}

#[tokio::test]
async fn script_streams_and_exit_code_round_trip() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("job.sh");
    {
        let mut file = std::fs::File::create(&path)?;
        writeln!(file, "echo out")?;
        writeln!(file, "echo err 1>&2")?;
        writeln!(file, "exit 7")?;
    }

    let spawner = shell();
    let (command, handle) = run_command(&spawner, format!("sh {}", path.display()), |_| {})?;
    with_timeout(handle.wait()).await?;

    assert_eq!(command.exit_code(), Some(7));
    assert_eq!(command.output().as_deref(), Some("out\n"));
    assert_eq!(command.error_output().as_deref(), Some("err\n"));

    Ok(())
}

#[tokio::test]
async fn run_batch_shortcut_reports_group_completion() -> TestResult {
    init_tracing();

    let spawner = shell();
    let done = Arc::new(Mutex::new(0));
    let counter = done.clone();

    let (batch, handles) = run_batch(&spawner, ["echo one", "echo two"], move |_| {
        *counter.lock().unwrap() += 1;
    })?;

    for handle in handles {
        with_timeout(handle.wait()).await?;
    }

    assert_eq!(*done.lock().unwrap(), 1);
    assert_eq!(batch.commands().len(), 2);
    assert!(batch.running_commands().is_empty());

    Ok(())
}
