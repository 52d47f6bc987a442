// Copyright 2024 Chronicle Labs
// SPDX-License-Identifier: Apache-2.0

//! `wait`/`wait_for`/`wait_stm`: blocking on a scope's children without
//! closing the scope. See `SPEC_FULL.md` §4.5.

use std::time::Duration;

use crate::scope::Scope;

impl<E> Scope<E> {
    /// Blocks until this scope currently has no running children. A child
    /// spawned concurrently with (or after) a call to `wait` may make the
    /// wait observe non-quiescence again before it returns; this is a
    /// snapshot barrier, not a permanent guarantee, unless called from
    /// somewhere that has also stopped spawning.
    pub async fn wait(&self) {
        self.state.drain().await;
    }

    /// As [`wait`](Self::wait), but gives up after `timeout` and returns
    /// whether the scope was quiescent by then.
    pub async fn wait_for(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }

    /// A single, non-blocking check of the same predicate `wait` blocks on.
    /// Meant for composing with `tokio::select!` alongside other readiness
    /// conditions, the way the original's STM-based `wait_stm` composed
    /// with other transactions.
    pub fn wait_stm(&self) -> bool {
        self.state.is_quiescent()
    }
}
