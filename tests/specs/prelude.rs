//! Test helpers for behavioral specifications.
//!
//! Each spec runs the `talon`/`talond` binaries black-box: a [`World`]
//! gives every test its own `TALON_STATE_DIR`, so daemons from different
//! tests never share a socket, log, or task snapshot.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, Instant};

use tempfile::TempDir;

// Aggressive but not hair-trigger timeouts: fast enough to keep the suite
// quick, generous enough that a loaded CI box doesn't flake.
const TALON_TIMEOUT_CONNECT_MS: &str = "5000";
const TALON_TIMEOUT_EXIT_MS: &str = "2000";
const TALON_TIMEOUT_IPC_MS: &str = "5000";
const TALON_CONNECT_POLL_MS: &str = "10";

pub const SPEC_POLL_INTERVAL_MS: u64 = 20;
pub const SPEC_WAIT_MAX_MS: u64 = 10_000;

/// Resolve a sibling binary: prefer an llvm-cov build, then the standard
/// debug dir, then fall back to resolving relative to this test binary
/// itself.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

fn talon_binary() -> PathBuf {
    binary_path("talon")
}

fn talond_binary() -> PathBuf {
    binary_path("talond")
}

/// A throwaway state directory plus any fixtures (a git repo for
/// task-orchestrator specs) a test wants to hang off it.
pub struct World {
    state_dir: TempDir,
    envs: Vec<(String, String)>,
}

impl World {
    pub fn new() -> Self {
        let state_dir = TempDir::new().expect("tempdir");
        Self {
            envs: vec![
                ("TALON_STATE_DIR".into(), state_dir.path().to_string_lossy().into_owned()),
                ("TALON_DAEMON_BINARY".into(), talond_binary().to_string_lossy().into_owned()),
                ("TALON_TIMEOUT_CONNECT_MS".into(), TALON_TIMEOUT_CONNECT_MS.into()),
                ("TALON_TIMEOUT_EXIT_MS".into(), TALON_TIMEOUT_EXIT_MS.into()),
                ("TALON_TIMEOUT_IPC_MS".into(), TALON_TIMEOUT_IPC_MS.into()),
                ("TALON_CONNECT_POLL_MS".into(), TALON_CONNECT_POLL_MS.into()),
            ],
            state_dir,
        }
    }

    pub fn path(&self) -> &Path {
        self.state_dir.path()
    }

    /// Set an extra environment variable every `cli()` invocation inherits,
    /// e.g. `TALON_CHAT_DISPATCH_MODE` or `TALON_ENGINE_COMMAND`.
    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.envs.push((key.to_string(), value.into()));
        self
    }

    /// Initialize a bare git repo with one commit on `main`, suitable for
    /// `TALON_REPO_PATH`, and return its path.
    pub fn init_repo(&self) -> PathBuf {
        let repo = self.state_dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        run_git(&repo, &["init", "-q", "-b", "main"]);
        run_git(&repo, &["config", "user.email", "talon@example.test"]);
        run_git(&repo, &["config", "user.name", "talon"]);
        std::fs::write(repo.join("README.md"), "seed\n").unwrap();
        run_git(&repo, &["add", "-A"]);
        run_git(&repo, &["commit", "-q", "-m", "seed"]);
        repo
    }

    /// Write an executable fake-engine script and return its path, ready
    /// to hand to `.env("TALON_ENGINE_COMMAND", ...)`. The engine command
    /// is split on whitespace (no shell quoting), so the script itself
    /// must take no arguments.
    pub fn fake_engine(&self, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = self.state_dir.path().join(name);
        std::fs::write(&path, script).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    pub fn cli(&self) -> CliBuilder {
        CliBuilder { args: Vec::new(), envs: self.envs.clone() }
    }

    /// `talon daemon stop` then block until the socket is gone, so a test
    /// that explicitly stops the daemon doesn't race its own assertions.
    pub fn stop_daemon(&self) {
        self.cli().args(&["daemon", "stop"]).command().output().ok();
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.stop_daemon();
    }
}

fn run_git(dir: &Path, args: &[&str]) {
    let status = Command::new("git").arg("-C").arg(dir).args(args).status().expect("git should run");
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

/// Poll `f` until it returns `Some`, or panic after [`SPEC_WAIT_MAX_MS`].
pub fn wait_until<T>(mut f: impl FnMut() -> Option<T>, what: &str) -> T {
    let start = Instant::now();
    loop {
        if let Some(v) = f() {
            return v;
        }
        if start.elapsed() > Duration::from_millis(SPEC_WAIT_MAX_MS) {
            panic!("timed out waiting for {what}");
        }
        std::thread::sleep(Duration::from_millis(SPEC_POLL_INTERVAL_MS));
    }
}

/// Fluent `talon` CLI invocation builder.
pub struct CliBuilder {
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn command(self) -> Command {
        let mut cmd = Command::new(talon_binary());
        cmd.args(&self.args);
        cmd.env_remove("TALON_STATE_DIR");
        for (key, value) in self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    pub fn passes(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            output.status.success(),
            "expected command to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    pub fn fails(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            !output.status.success(),
            "expected command to fail, but it passed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    pub fn run(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        RunAssert { output }
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(stdout.contains(expected), "stdout does not contain '{expected}'\nstdout: {stdout}");
        self
    }

    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        let stdout = self.stdout();
        assert!(!stdout.contains(unexpected), "stdout should not contain '{unexpected}'\nstdout: {stdout}");
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(stderr.contains(expected), "stderr does not contain '{expected}'\nstderr: {stderr}");
        self
    }
}
