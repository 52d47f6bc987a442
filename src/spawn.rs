// Copyright 2024 Chronicle Labs
// SPDX-License-Identifier: Apache-2.0

//! `low_level_fork`: the single spawn primitive every public `Scope` method
//! in `scope.rs` is built from. See `SPEC_FULL.md` §4.2 for the four-step
//! reserve/mint/create/record protocol and the race it deliberately leaves
//! observable.

use std::{future::Future, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::{
    child::{OutcomeSlot, Thread},
    error::SpawnError,
    mask::Unmask,
    signal::IsCancellation,
    state::ScopeState,
};

/// Which failures a child reports to its parent's `first_failure` slot. See
/// `SPEC_FULL.md` §4.4.
#[derive(Clone, Copy)]
pub(crate) enum Propagation {
    /// `spawn`/`spawn_detached`: report any failure.
    Always,
    /// `spawn_silent`: report only a failure classified as a reaction to
    /// cancellation (an ancestor's, since this scope's own is filtered out
    /// regardless of policy).
    OnCancellationOnly,
}

fn should_propagate<T, E: IsCancellation>(
    policy: Propagation,
    result: &Result<T, E>,
    token: &CancellationToken,
) -> bool {
    let Err(err) = result else { return false };
    if err.is_cancellation() && token.is_cancelled() {
        // This scope's own closing signal caused the failure; reporting it
        // back to the same scope would be pointless noise at best and, if
        // the body itself succeeded, a spurious failure at worst.
        return false;
    }
    match policy {
        Propagation::Always => true,
        Propagation::OnCancellationOnly => err.is_cancellation(),
    }
}

/// Spawns `action` as a child of the scope behind `state`.
///
/// `action` receives an [`Unmask`] handle regardless of whether the caller's
/// public-facing closure wanted one; the non-`_with_unmask` spawn variants in
/// `scope.rs` simply construct an `action` that ignores it.
///
/// `propagate` selects which of a failing `action`'s errors are reported to
/// the parent's first-failure slot — see [`Propagation`] and `SPEC_FULL.md`
/// §4.4.
pub(crate) fn low_level_fork<T, E, F, Fut>(
    state: &Arc<ScopeState<E>>,
    propagate: Propagation,
    action: F,
) -> Result<Thread<T, E>, SpawnError>
where
    F: FnOnce(Unmask) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + Sync + Clone + IsCancellation + 'static,
{
    // Step 1: reserve a slot, failing fast if the scope is already closed.
    state.try_reserve()?;

    // Step 2: mint this child's id and its own cancellation token.
    let id = state.mint_child_id();
    let child_token = state.token.child_token();
    let outcome = Arc::new(OutcomeSlot::new());

    let task_state = state.clone();
    let task_outcome = outcome.clone();
    let task_token = child_token.clone();
    // `action` runs in its own task so a panic inside it surfaces to the
    // supervisor task below as a `JoinError` instead of unwinding straight
    // through it: the supervisor's bookkeeping (clearing this child out of
    // `children`) must run even when `action` never returns normally, or
    // `drain`/`Scope::open`/`Thread::join` would hang forever on a child
    // that can no longer finish.
    let inner = tokio::spawn(async move { action(Unmask::new(task_token)).await });
    let _ = tokio::spawn(async move {
        match inner.await {
            Ok(result) => {
                // Report failure to the parent's first-failure slot *before*
                // this child is removed from the bookkeeping map:
                // `drain`/`wait` wake up as soon as the map empties, so a
                // waiter must never be able to observe "no children left"
                // before a pending failure is visible.
                if should_propagate(propagate, &result, &task_state.token) {
                    if let Err(err) = &result {
                        task_state.report_failure(err.clone());
                    }
                }

                // Step 3, run from inside the child: remove this child from
                // the map (or leave a placeholder if the spawner hasn't
                // recorded it yet) before anything observes the outcome.
                // See the "delete-before-hook ordering" decision in
                // DESIGN.md.
                task_state.merge_child_finished(id);

                task_outcome.set(result);
            }
            Err(join_err) => {
                // No value of the caller's `E` can represent a panic, so the
                // outcome slot is left unset here: `join`/`join_for`/
                // `try_join` on this one handle never resolve. Clearing the
                // bookkeeping is what matters for the scope itself — this is
                // what unblocks `drain`/`close`/`Scope::open`.
                task_state.merge_child_finished(id);
                log::error!("scope {:x}: child {id} did not finish normally: {join_err}", task_state.id);
                if join_err.is_panic() {
                    std::panic::resume_unwind(join_err.into_panic());
                }
            }
        }
    });

    // Step 4: record the child as running, or reap the placeholder it may
    // have already left if step 3 above won the race.
    state.merge_child_started(id, child_token.clone());

    Ok(Thread::new(id, child_token, outcome))
}
