// Copyright 2024 Chronicle Labs
// SPDX-License-Identifier: Apache-2.0

//! `Scope`: the type a body and its children spawn from. See `SPEC_FULL.md`
//! §4.1 for the open/close protocol and §4.3 for the spawn surface.

use std::{future::Future, sync::Arc};

use crate::{
    child::Thread,
    error::SpawnError,
    mask::Unmask,
    signal::IsCancellation,
    state::ScopeState,
};

/// A region that cannot finish while any child spawned from it is still
/// running. Cloning a `Scope` is cheap — every clone refers to the same
/// underlying state — and is how a spawned child's action receives its own
/// ability to spawn further children of the same scope.
pub struct Scope<E> {
    pub(crate) state: Arc<ScopeState<E>>,
}

impl<E> Clone for Scope<E> {
    fn clone(&self) -> Self {
        Self { state: self.state.clone() }
    }
}

impl<E> Scope<E>
where
    E: Send + Sync + Clone + IsCancellation + 'static,
{
    /// Opens a new top-level scope, runs `body` in it, and closes the scope
    /// before returning: the call cannot resolve while any child spawned
    /// through the `Scope` handed to `body` (directly or via a handle it
    /// stashed) is still running.
    ///
    /// `body`'s own failure always wins over a propagated child failure;
    /// otherwise the reconciled result is `body`'s success or, if some
    /// propagating child failed first, that child's error. See the
    /// reconciliation rule in `SPEC_FULL.md` §4.1 step 5.
    pub async fn open<T, F, Fut>(body: F) -> Result<T, E>
    where
        F: FnOnce(Scope<E>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let state = Arc::new(ScopeState::new(None));
        let scope = Scope { state: state.clone() };
        let body_result = body(scope).await;
        let propagated = close(&state).await;
        match body_result {
            Err(err) => Err(err),
            Ok(value) => match propagated {
                Some(err) => Err(err),
                None => Ok(value),
            },
        }
    }

    /// Spawns `action` as a child of this scope. The child's failure is
    /// visible only through the returned handle; it is never reported to
    /// this scope's own result.
    pub fn spawn_silent<T, F, Fut>(&self, action: F) -> Result<Thread<T, E>, SpawnError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
    {
        crate::spawn::low_level_fork(
            &self.state,
            crate::spawn::Propagation::OnCancellationOnly,
            move |_unmask| action(),
        )
    }

    /// As [`spawn_silent`](Self::spawn_silent), but `action` receives an
    /// [`Unmask`] it can use to race part of its work against this scope's
    /// cancellation.
    pub fn spawn_silent_with_unmask<T, F, Fut>(&self, action: F) -> Result<Thread<T, E>, SpawnError>
    where
        F: FnOnce(Unmask) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
    {
        crate::spawn::low_level_fork(&self.state, crate::spawn::Propagation::OnCancellationOnly, action)
    }

    /// Spawns `action` as a child of this scope. If `action` fails, its
    /// error is reported to this scope (unless the failure was itself a
    /// reaction to this scope's own cancellation — see [`IsCancellation`]),
    /// causing `Scope::open`/`Scope::open`'s caller to see it once the scope
    /// closes, in addition to being visible through the returned handle.
    pub fn spawn<T, F, Fut>(&self, action: F) -> Result<Thread<T, E>, SpawnError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
    {
        crate::spawn::low_level_fork(&self.state, crate::spawn::Propagation::Always, move |_unmask| {
            action()
        })
    }

    /// As [`spawn`](Self::spawn), but `action` receives an [`Unmask`].
    pub fn spawn_with_unmask<T, F, Fut>(&self, action: F) -> Result<Thread<T, E>, SpawnError>
    where
        F: FnOnce(Unmask) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
    {
        crate::spawn::low_level_fork(&self.state, crate::spawn::Propagation::Always, action)
    }

    /// As [`spawn`](Self::spawn), but discards the handle. Useful for
    /// fire-and-forget work whose only observable effect is whether it
    /// fails.
    pub fn spawn_detached<T, F, Fut>(&self, action: F) -> Result<(), SpawnError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
    {
        self.spawn(action).map(|_handle| ())
    }

    /// As [`spawn_detached`](Self::spawn_detached), but `action` receives an
    /// [`Unmask`].
    pub fn spawn_detached_with_unmask<T, F, Fut>(&self, action: F) -> Result<(), SpawnError>
    where
        F: FnOnce(Unmask) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
    {
        self.spawn_with_unmask(action).map(|_handle| ())
    }

    /// Returns whether this scope has begun closing or been cancelled by an
    /// ancestor. A child's action observing this through its [`Unmask`]
    /// (rather than this method) is the only way it can react to
    /// cancellation while masked work is in flight.
    pub fn is_cancelled(&self) -> bool {
        self.state.token.is_cancelled()
    }
}

/// The close protocol: freeze spawning, signal every still-running child,
/// wait for them all to finish, and return whatever failure a propagating
/// child reported. Runs unconditionally once `body` returns, regardless of
/// whether `body` itself succeeded.
async fn close<E>(state: &Arc<ScopeState<E>>) -> Option<E> {
    let children = state.freeze().await;
    if !children.is_empty() {
        log::debug!("scope {:x}: signalling {} child(ren)", state.id, children.len());
    }
    for (id, _token) in &children {
        log::trace!("scope {:x}: cancelling child {id}", state.id);
    }
    // Cancelling this scope's token cascades to every child token derived
    // from it in one non-blocking call; the ascending-id loop above exists
    // for log ordering only, not because delivery itself is sequential.
    state.token.cancel();
    state.drain().await;
    state.take_first_failure()
}
