// Copyright 2024 Chronicle Labs
// SPDX-License-Identifier: Apache-2.0

//! Masking/unmasking, spec.md §4.2/§4.3.
//!
//! A freshly spawned child's action runs *masked* by default: nothing in it
//! observes the scope's cancellation unless the action explicitly asks to,
//! by racing a future against cancellation through [`Unmask::unmask`]. This
//! is the cooperative, checked analogue of the original's dynamically scoped
//! masking regions; see `SPEC_FULL.md` §9 for why preemptive masking has no
//! faithful equivalent on this substrate and why this is the right
//! replacement rather than an approximation.

use tokio_util::sync::CancellationToken;

use crate::signal::Cancelled;

/// Passed to a child's action by the `_with_unmask` spawn variants.
///
/// Cloning an `Unmask` is cheap and yields a handle over the same
/// cancellation token; it carries no scope state beyond that token.
#[derive(Clone, Debug)]
pub struct Unmask {
    pub(crate) token: CancellationToken,
}

impl Unmask {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Races `fut` against the scope's cancellation token. Returns
    /// `Err(Cancelled)` if the scope is cancelled before `fut` resolves,
    /// otherwise `Ok(fut`'s output`)`.
    ///
    /// Only the duration of this call is "unmasked" — once it returns, the
    /// action is masked again until the next `unmask` call.
    pub async fn unmask<F, T>(&self, fut: F) -> Result<T, Cancelled>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Cancelled),
            value = fut => Ok(value),
        }
    }

    /// Returns whether the scope has already been cancelled, without
    /// blocking. Useful for a cooperative poll loop that wants to bail out
    /// between iterations rather than race every single await point.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
