// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Engine` trait: the opaque boundary to the agent engine process.
//!
//! The core treats the engine as a black box that turns an [`EngineInput`]
//! into text. Two implementations are provided: [`ProcessEngine`], which
//! spawns a configured command per turn, and [`FakeEngine`] for tests.

mod process;

pub use process::{ProcessEngine, ProcessEngineConfig};

use async_trait::async_trait;
use talon_core::{EngineError, EngineInput, EngineOutput};
use tokio_util::sync::CancellationToken;

/// The agent engine boundary consumed by [`crate::vcs`]-independent core
/// logic: one turn in, one reply out, cooperatively cancellable.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    /// Run one engine turn. `cancel` fires when the caller wants to abort
    /// the in-flight turn (operator `!stop`, session `abort` RPC, or a task
    /// cancellation request); implementations must race it against the
    /// underlying call and return [`EngineError::Cancelled`] promptly.
    async fn complete(&self, input: EngineInput, cancel: CancellationToken) -> Result<EngineOutput, EngineError>;

    /// A cheap liveness probe, used by health reporting; not part of the
    /// hot turn path.
    async fn ping(&self) -> bool;
}

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{EngineCall, FakeEngine};
