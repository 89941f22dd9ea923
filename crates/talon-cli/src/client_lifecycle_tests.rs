use super::*;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn daemon_stop_returns_false_when_no_pid_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::env::set_var("TALON_STATE_DIR", dir.path());

    let stopped = daemon_stop(false).await.expect("daemon_stop");
    assert!(!stopped);

    std::env::remove_var("TALON_STATE_DIR");
}

#[tokio::test]
#[serial]
async fn daemon_stop_cleans_up_a_stale_pid_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::env::set_var("TALON_STATE_DIR", dir.path());

    // A pid that is exceedingly unlikely to correspond to a live process.
    std::fs::write(dir.path().join("daemon.pid"), "999999").expect("write pid");

    let stopped = daemon_stop(false).await.expect("daemon_stop");
    assert!(!stopped);
    assert!(!dir.path().join("daemon.pid").exists());

    std::env::remove_var("TALON_STATE_DIR");
}

#[test]
#[serial]
fn log_connection_error_writes_to_cli_log() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::env::set_var("TALON_STATE_DIR", dir.path());

    log_connection_error(&ClientError::DaemonNotRunning);

    let log_path = dir.path().join("cli.log");
    assert!(log_path.exists());
    let content = std::fs::read_to_string(&log_path).expect("read log");
    assert!(content.contains("daemon is not running"));

    std::env::remove_var("TALON_STATE_DIR");
}
