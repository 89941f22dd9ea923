//! Behavioral specifications for the talon daemon and CLI.
//!
//! These tests are black-box: they spawn real `talond`/`talon` processes
//! and assert on stdout, stderr, and exit codes. Each test gets its own
//! `TALON_STATE_DIR`, so tests may run concurrently.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/daemon/lifecycle.rs"]
mod daemon_lifecycle;

#[path = "specs/alias/lifecycle.rs"]
mod alias_lifecycle;

#[path = "specs/session/send_and_status.rs"]
mod session_send_and_status;

#[path = "specs/task/submission.rs"]
mod task_submission;
