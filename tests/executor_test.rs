//! Shell executor behavior under real child processes.

use std::time::{Duration, Instant};

use forager::infrastructure::executor::{ShellExecutor, ShellExecutorConfig};
use forager::infrastructure::shutdown::ShutdownFlag;

fn executor_with(runtime: Duration, shutdown: ShutdownFlag) -> ShellExecutor {
    ShellExecutor::new(
        ShellExecutorConfig {
            runtime,
            ..Default::default()
        },
        shutdown,
    )
}

#[tokio::test]
async fn captures_combined_output() {
    let exec = executor_with(Duration::from_secs(5), ShutdownFlag::new());
    let output = exec.execute("echo hello; echo world >&2").await.unwrap();
    let text = String::from_utf8_lossy(&output);
    assert!(text.contains("hello"));
    assert!(text.contains("world"));
}

#[tokio::test]
async fn silent_command_returns_empty_capture() {
    let exec = executor_with(Duration::from_secs(5), ShutdownFlag::new());
    let output = exec.execute("true").await.unwrap();
    assert!(output.is_empty());
}

#[tokio::test]
async fn runtime_cap_bounds_a_nonterminating_child() {
    let exec = executor_with(Duration::from_secs(2), ShutdownFlag::new());
    let started = Instant::now();
    let result = exec.execute("sleep 1000").await;
    let elapsed = started.elapsed();

    // The group dies shortly after the budget; well under the budget plus
    // the full escalation ladder.
    assert!(result.is_ok());
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(8), "took {elapsed:?}");
}

#[tokio::test]
async fn group_signal_reaches_grandchildren() {
    let exec = executor_with(Duration::from_secs(1), ShutdownFlag::new());
    let started = Instant::now();
    // The shell spawns a background grandchild and waits on it.
    let result = exec.execute("sleep 1000 & wait").await;
    assert!(result.is_ok());
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[tokio::test]
async fn termination_flag_cuts_execution_short() {
    let shutdown = ShutdownFlag::new();
    let exec = executor_with(Duration::from_secs(600), shutdown.clone());

    let handle = tokio::spawn(async move { exec.execute("sleep 600").await });
    tokio::time::sleep(Duration::from_millis(300)).await;
    let started = Instant::now();
    shutdown.trigger();

    let result = handle.await.unwrap();
    assert!(result.is_ok());
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[tokio::test]
async fn capture_is_truncated_at_the_cap() {
    let exec = ShellExecutor::new(
        ShellExecutorConfig {
            runtime: Duration::from_secs(10),
            max_capture_bytes: 1024,
            ..Default::default()
        },
        ShutdownFlag::new(),
    );
    let output = exec.execute("head -c 100000 /dev/zero").await.unwrap();
    assert_eq!(output.len(), 1024);
}

#[tokio::test]
async fn partial_output_survives_a_timeout() {
    let exec = executor_with(Duration::from_secs(1), ShutdownFlag::new());
    let output = exec.execute("echo first; sleep 1000").await.unwrap();
    assert!(String::from_utf8_lossy(&output).contains("first"));
}
