use super::*;
use serial_test::serial;
use std::env;

fn clear_env() {
    for (key, _) in env::vars() {
        if key.starts_with("TALON_") {
            env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn loads_defaults_with_home_set() {
    clear_env();
    env::set_var("HOME", "/tmp/talon-config-test-home");
    let config = Config::load().unwrap();
    assert_eq!(config.task_max_concurrency, 4);
    assert_eq!(config.chat_dispatch_mode, ChatDispatchMode::Hybrid);
    assert_eq!(config.chat_task_update_poll_ms, 1500);
}

#[test]
#[serial]
fn rejects_concurrency_out_of_range() {
    clear_env();
    env::set_var("HOME", "/tmp/talon-config-test-home");
    env::set_var("TALON_TASK_MAX_CONCURRENCY", "33");
    let err = Config::load().unwrap_err();
    assert_eq!(err, ConfigError::ConcurrencyOutOfRange(33));
    env::remove_var("TALON_TASK_MAX_CONCURRENCY");
}

#[test]
#[serial]
fn rejects_poll_below_minimum() {
    clear_env();
    env::set_var("HOME", "/tmp/talon-config-test-home");
    env::set_var("TALON_CHAT_TASK_UPDATE_POLL_MS", "100");
    let err = Config::load().unwrap_err();
    assert_eq!(err, ConfigError::TooSmall { name: "TALON_CHAT_TASK_UPDATE_POLL_MS", value: 100, min: 500 });
    env::remove_var("TALON_CHAT_TASK_UPDATE_POLL_MS");
}

#[test]
#[serial]
fn rejects_invalid_dispatch_mode() {
    clear_env();
    env::set_var("HOME", "/tmp/talon-config-test-home");
    env::set_var("TALON_CHAT_DISPATCH_MODE", "bogus");
    let err = Config::load().unwrap_err();
    assert_eq!(err, ConfigError::InvalidDispatchMode("bogus".to_string()));
    env::remove_var("TALON_CHAT_DISPATCH_MODE");
}

#[test]
#[serial]
fn session_control_dir_is_sibling_of_control_socket() {
    clear_env();
    env::set_var("HOME", "/tmp/talon-config-test-home");
    env::set_var("TALON_CONTROL_SOCKET_PATH", "/tmp/talon-config-test-home/daemon.sock");
    let config = Config::load().unwrap();
    assert_eq!(config.session_control_dir(), PathBuf::from("/tmp/talon-config-test-home/session-control"));
    env::remove_var("TALON_CONTROL_SOCKET_PATH");
}
