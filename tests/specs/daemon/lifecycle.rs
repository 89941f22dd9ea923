//! Daemon lifecycle specs: start/stop/status through the `talon` CLI.

use crate::prelude::*;

#[test]
fn status_reports_not_running_before_start() {
    let world = World::new();
    world.cli().args(&["daemon", "status"]).passes().stdout_has("not running");
}

#[test]
fn start_then_status_then_stop() {
    let world = World::new();

    world.cli().args(&["daemon", "start"]).passes().stdout_has("talond started");

    // A second start is a no-op, not an error.
    world.cli().args(&["daemon", "start"]).passes().stdout_has("already running");

    world.cli().args(&["daemon", "status"]).passes().stdout_has("running");

    world.cli().args(&["daemon", "stop"]).passes().stdout_has("talond stopped");

    world.cli().args(&["daemon", "status"]).passes().stdout_has("not running");

    // A second stop is also a no-op.
    world.cli().args(&["daemon", "stop"]).passes().stdout_has("not running");
}

#[test]
fn send_auto_starts_the_daemon() {
    let world = World::new();
    world.cli().args(&["daemon", "status"]).passes().stdout_has("not running");

    world.cli().args(&["send", "socket:eng:main", "hello there"]).passes().stdout_has("Delivered to socket:eng:main");

    world.cli().args(&["daemon", "status"]).passes().stdout_has("running");
}
