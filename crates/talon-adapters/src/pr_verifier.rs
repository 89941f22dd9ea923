// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `PrVerifier` trait: whether a PR URL an engine claims in its reply
//! actually exists on the forge.
//!
//! No real forge is wired in here — checking GitHub would mean an HTTP
//! client and auth token plumbing neither this daemon nor its tests need.
//! Real deployments inject their own implementation; [`FakePrVerifier`]
//! is what tests and the default build use.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;

/// Confirms that a PR URL the engine claims to have opened is real, so the
/// session layer can rewrite unverifiable claims out of a reply rather than
/// surface them to the user.
#[async_trait]
pub trait PrVerifier: Send + Sync + 'static {
    async fn verify(&self, pr_url: &str) -> bool;
}

/// Verifies against a set of URLs seeded by the test, defaulting to
/// "nothing verifies" so tests opt in explicitly rather than accidentally
/// passing on an unverified claim.
pub struct FakePrVerifier {
    known: Mutex<HashSet<String>>,
}

impl FakePrVerifier {
    pub fn new() -> Self {
        Self { known: Mutex::new(HashSet::new()) }
    }

    pub fn mark_verified(&self, pr_url: impl Into<String>) {
        self.known.lock().insert(pr_url.into());
    }
}

impl Default for FakePrVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrVerifier for FakePrVerifier {
    async fn verify(&self, pr_url: &str) -> bool {
        self.known.lock().contains(pr_url)
    }
}

#[cfg(test)]
#[path = "pr_verifier_tests.rs"]
mod tests;
