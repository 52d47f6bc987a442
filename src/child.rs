// Copyright 2024 Chronicle Labs
// SPDX-License-Identifier: Apache-2.0

//! The handle a spawner gets back for a child it wants to observe: a
//! single-assignment outcome slot plus `.join()`/`.join_for()`/`.try_join()`.
//! See `SPEC_FULL.md` §3/§4.3/§6.

use std::{fmt, sync::Arc, sync::Mutex, time::Duration};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// A single-assignment slot a child writes its outcome into exactly once,
/// and any number of `Thread` handles can await.
///
/// Mirrors the check-register-recheck shape of an `AtomicWaker`-backed
/// future: a waiter checks the slot, and only sleeps on `notify` if it was
/// still empty, re-checking immediately after waking to close the race
/// against a write that lands between the check and the sleep.
pub(crate) struct OutcomeSlot<T, E> {
    result: Mutex<Option<Result<T, E>>>,
    notify: Notify,
}

impl<T, E> OutcomeSlot<T, E> {
    pub(crate) fn new() -> Self {
        Self {
            result: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    pub(crate) fn set(&self, result: Result<T, E>) {
        let mut slot = self.result.lock().unwrap();
        debug_assert!(slot.is_none(), "a child wrote its outcome twice");
        *slot = Some(result);
        drop(slot);
        self.notify.notify_waiters();
    }

    async fn wait(&self) -> Result<T, E>
    where
        T: Clone,
        E: Clone,
    {
        loop {
            let notified = self.notify.notified();
            if let Some(result) = self.result.lock().unwrap().clone() {
                return result;
            }
            notified.await;
        }
    }

    /// A single, non-blocking peek at the slot: the STM-style primitive
    /// `wait` is built from.
    fn peek(&self) -> Option<Result<T, E>>
    where
        T: Clone,
        E: Clone,
    {
        self.result.lock().unwrap().clone()
    }
}

/// A handle to a spawned child, returned by the handle-bearing spawn
/// variants. Dropping it does not cancel or detach the child — the scope
/// still owns its lifetime and will wait for it (and cancel it on close)
/// regardless of whether any handle survives.
pub struct Thread<T, E> {
    pub(crate) id: u64,
    pub(crate) token: CancellationToken,
    pub(crate) outcome: Arc<OutcomeSlot<T, E>>,
}

impl<T, E> Thread<T, E> {
    pub(crate) fn new(id: u64, token: CancellationToken, outcome: Arc<OutcomeSlot<T, E>>) -> Self {
        Self { id, token, outcome }
    }

    /// Waits for the child to finish and returns its outcome. Returns the
    /// same value no matter how many times it is called or how many clones
    /// of this handle exist (`Thread` does not implement `Clone` itself, but
    /// the underlying slot is shared and would allow it if a future version
    /// needs to).
    pub async fn join(&self) -> Result<T, E>
    where
        T: Clone,
        E: Clone,
    {
        self.outcome.wait().await
    }

    /// As `join`, but gives up and returns `None` if the child has not
    /// finished within `timeout`. The child itself keeps running either way.
    pub async fn join_for(&self, timeout: Duration) -> Option<Result<T, E>>
    where
        T: Clone,
        E: Clone,
    {
        tokio::time::timeout(timeout, self.join()).await.ok()
    }

    /// A single, non-blocking check of the same slot `join` blocks on:
    /// `Some(outcome)` if the child has already finished, `None` otherwise.
    /// The handle-level counterpart to [`crate::scope::Scope::wait_stm`], for
    /// composing with `tokio::select!` instead of awaiting.
    pub fn try_join(&self) -> Option<Result<T, E>>
    where
        T: Clone,
        E: Clone,
    {
        self.outcome.peek()
    }

    /// Returns whether the scope has requested this child cancel itself.
    /// Does not tell you whether the child has acted on it yet.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<T, E> fmt::Debug for Thread<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<T, E> PartialEq for Thread<T, E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T, E> Eq for Thread<T, E> {}

impl<T, E> PartialOrd for Thread<T, E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, E> Ord for Thread<T, E> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}
