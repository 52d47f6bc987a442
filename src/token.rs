// Copyright 2024 Chronicle Labs
// SPDX-License-Identifier: Apache-2.0

//! An optional cancellation-reason facility, kept separate from [`Scope`]'s
//! default cancellation rather than wired into it. See the "Open questions
//! decided" section of `DESIGN.md` and `SPEC_FULL.md` §9: spec.md's own
//! design notes mention a historical variant that attached a reason to a
//! scope's closing signal, but the chosen default API does not need one, so
//! it lives here for callers who do.
//!
//! `ReasonedToken` does not replace [`crate::scope::Scope`]'s own
//! cancellation token; it is an independent token a caller can thread
//! alongside a scope for its own bookkeeping, e.g. to tell apart "the health
//! check triggered this shutdown" from "the CLI's Ctrl-C handler did."

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// A cancellation token paired with a first-write-wins reason slot.
pub struct ReasonedToken<R> {
    token: CancellationToken,
    reason: Mutex<Option<R>>,
}

impl<R: Clone> ReasonedToken<R> {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Mutex::new(None),
        }
    }

    /// Derives a child token whose cancellation follows this one's, sharing
    /// no reason slot of its own — a child observes the parent's reason
    /// through [`ReasonedToken::reason`] on the parent, not its own.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Cancels this token and records `reason`, unless it was already
    /// cancelled — the first caller's reason wins, matching the first-
    /// failure-only rule `Scope`'s own close protocol uses for propagated
    /// errors.
    pub fn cancel_with(&self, reason: R) {
        let mut slot = self.reason.lock().unwrap();
        if slot.is_none() {
            *slot = Some(reason);
        }
        drop(slot);
        self.token.cancel();
    }

    /// Returns the reason this token was cancelled with, if it has been.
    pub fn reason(&self) -> Option<R> {
        self.reason.lock().unwrap().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

impl<R: Clone> Default for ReasonedToken<R> {
    fn default() -> Self {
        Self::new()
    }
}
