// Copyright 2024 Chronicle Labs
// SPDX-License-Identifier: Apache-2.0

//! Scope-local shared state: the `children` map, the `starting` counter, and
//! the gate/first-failure machinery close and wait are built on. See
//! `SPEC_FULL.md` §3 for the invariants this module enforces.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::SpawnError;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(0);

/// A live child's slot in the scope's bookkeeping map. See the merge rules in
/// `spawn.rs` and invariant I3/I4 in `SPEC_FULL.md` §3.
pub(crate) enum ChildSlot {
    /// The child's task is known to be running; this is a clone of its own
    /// cancellation token, used only to check whether this scope's closing
    /// signal has already reached it (never as an address to send to).
    Running(CancellationToken),
    /// The child finished before the spawner recorded it as `Running`.
    Placeholder,
}

pub(crate) struct Inner {
    pub(crate) children: HashMap<u64, ChildSlot>,
    /// `-1` once the scope is closed; otherwise the count of reservations
    /// that have not yet been recorded in `children`.
    pub(crate) starting: i64,
}

/// The state shared by a scope's body, its children, and any outstanding
/// child handles. Always held behind an `Arc`.
pub(crate) struct ScopeState<E> {
    pub(crate) id: u64,
    pub(crate) inner: Mutex<Inner>,
    /// Woken whenever `inner` changes, so that close's freeze/drain loops and
    /// `wait()` can recheck their predicate instead of polling.
    pub(crate) gate: Notify,
    next_child_id: AtomicU64,
    /// This scope's own cancellation source. Children are spawned with
    /// `token.child_token()`.
    pub(crate) token: CancellationToken,
    /// First-write-wins slot for a child's propagated failure. See
    /// `SPEC_FULL.md` §4.1 step 3 and §4.4.
    first_failure: Mutex<Option<E>>,
}

impl<E> ScopeState<E> {
    /// Creates a fresh scope. `parent_token`, if given, makes this scope's
    /// cancellation a child of the parent's — cancelling the parent also
    /// cancels this scope and everything spawned in it.
    pub(crate) fn new(parent_token: Option<&CancellationToken>) -> Self {
        let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
        let token = match parent_token {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        log::trace!("opening scope {id:x}");
        Self {
            id,
            inner: Mutex::new(Inner {
                children: HashMap::new(),
                starting: 0,
            }),
            gate: Notify::new(),
            next_child_id: AtomicU64::new(0),
            token,
            first_failure: Mutex::new(None),
        }
    }

    /// Step 1 of `low_level_fork`: reserve a spawn slot, or fail if the scope
    /// is already closed.
    pub(crate) fn try_reserve(&self) -> Result<(), SpawnError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.starting < 0 {
            return Err(SpawnError::ScopeClosed);
        }
        inner.starting += 1;
        Ok(())
    }

    /// Step 2 of `low_level_fork`: mint a fresh, monotonically increasing
    /// child id.
    pub(crate) fn mint_child_id(&self) -> u64 {
        self.next_child_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Step 3's merge update, run from inside the child's own task once its
    /// action has finished: remove a `Running` entry, or insert a
    /// `Placeholder` if the spawner hasn't recorded this child yet.
    pub(crate) fn merge_child_finished(&self, id: u64) {
        let mut inner = self.inner.lock().unwrap();
        match inner.children.get(&id) {
            Some(ChildSlot::Running(_)) => {
                inner.children.remove(&id);
            }
            None => {
                inner.children.insert(id, ChildSlot::Placeholder);
            }
            Some(ChildSlot::Placeholder) => {
                // Unreachable: a child never runs its own completion hook twice.
                log::warn!("scope {:x}: child {id} finished twice", self.id);
            }
        }
        drop(inner);
        self.gate.notify_waiters();
    }

    /// Step 4's merge update, run from the spawner immediately after
    /// `tokio::spawn` returns: record the child as running, or reap it if it
    /// already raced ahead and left a placeholder. Always decrements
    /// `starting`.
    pub(crate) fn merge_child_started(&self, id: u64, token: CancellationToken) {
        let mut inner = self.inner.lock().unwrap();
        match inner.children.remove(&id) {
            Some(ChildSlot::Placeholder) => {
                log::trace!("scope {:x}: child {id} finished before being recorded", self.id);
            }
            None => {
                inner.children.insert(id, ChildSlot::Running(token));
            }
            Some(ChildSlot::Running(_)) => {
                // Unreachable: a child id is only recorded once.
                log::warn!("scope {:x}: child {id} recorded twice", self.id);
            }
        }
        inner.starting -= 1;
        drop(inner);
        self.gate.notify_waiters();
    }

    /// Close step 1: wait until no spawn is mid-flight, then freeze the
    /// scope and return a snapshot of its children in ascending id order.
    pub(crate) async fn freeze(&self) -> Vec<(u64, CancellationToken)> {
        loop {
            let mut inner = self.inner.lock().unwrap();
            if inner.starting == 0 {
                inner.starting = -1;
                let mut snapshot: Vec<(u64, CancellationToken)> = inner
                    .children
                    .iter()
                    .filter_map(|(id, slot)| match slot {
                        ChildSlot::Running(token) => Some((*id, token.clone())),
                        ChildSlot::Placeholder => None,
                    })
                    .collect();
                snapshot.sort_unstable_by_key(|(id, _)| *id);
                return snapshot;
            }
            let notified = self.gate.notified();
            drop(inner);
            notified.await;
        }
    }

    /// Close step 4 / `wait()`'s underlying predicate: block until
    /// `children` is empty and `starting == 0`.
    pub(crate) async fn drain(&self) {
        loop {
            let inner = self.inner.lock().unwrap();
            if inner.children.is_empty() && inner.starting == 0 {
                return;
            }
            let notified = self.gate.notified();
            drop(inner);
            notified.await;
        }
    }

    /// Single-poll version of `drain`'s predicate, for `wait_stm`.
    pub(crate) fn is_quiescent(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.children.is_empty() && inner.starting == 0
    }

    /// First-write-wins report of a child's propagated failure.
    pub(crate) fn report_failure(&self, err: E) {
        let mut slot = self.first_failure.lock().unwrap();
        if slot.is_none() {
            *slot = Some(err);
        } else {
            log::warn!(
                "scope {:x}: discarding a second propagated failure while closing",
                self.id
            );
        }
    }

    /// Reconciliation's read of the first propagated failure, if any.
    pub(crate) fn take_first_failure(&self) -> Option<E> {
        self.first_failure.lock().unwrap().take()
    }
}
