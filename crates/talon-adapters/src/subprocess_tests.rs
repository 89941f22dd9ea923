use super::*;
use tokio::process::Command;

#[tokio::test]
async fn run_with_timeout_returns_output_on_success() {
    let cmd = Command::new("true");
    let output = run_with_timeout(cmd, Duration::from_secs(5), "true").await.unwrap();
    assert!(output.status.success());
}

#[tokio::test]
async fn run_with_timeout_reports_timeout() {
    let mut cmd = Command::new("sleep");
    cmd.arg("5");
    let err = run_with_timeout(cmd, Duration::from_millis(50), "sleep").await.unwrap_err();
    assert!(err.contains("timed out"), "unexpected error: {err}");
}

#[tokio::test]
async fn run_with_timeout_reports_spawn_failure() {
    let cmd = Command::new("/nonexistent/definitely-not-a-binary");
    let err = run_with_timeout(cmd, Duration::from_secs(5), "missing").await.unwrap_err();
    assert!(err.contains("missing failed"), "unexpected error: {err}");
}
