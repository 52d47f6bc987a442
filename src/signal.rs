// Copyright 2024 Chronicle Labs
// SPDX-License-Identifier: Apache-2.0

//! The typed replacement for spec.md's "carries the asynchronous-signal
//! marker" predicate: instead of tagging a value at runtime, a scope's error
//! type can implement [`IsCancellation`] to tell `spawn_silent` whether a
//! given failure happened *because* the scope was cancelled, as opposed to
//! the child's own logic failing on its own terms.

use thiserror::Error;

/// Raised by [`crate::mask::Unmask::unmask`] when the scope's cancellation
/// token fired before the raced future completed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cancelled")]
pub struct Cancelled;

/// Tells propagation whether a child's failure happened because the scope
/// was cancelled, rather than through the child's own logic.
///
/// The library's own [`Cancelled`] always answers `true`. Implement this for
/// your own error type if it has a variant produced only in response to
/// observing cancellation (for example, one constructed from a propagated
/// [`Cancelled`]); the default answers `false`, which is the correct answer
/// for "this failure was not a reaction to cancellation."
pub trait IsCancellation {
    /// Returns whether this failure happened in reaction to cancellation.
    fn is_cancellation(&self) -> bool {
        false
    }
}

impl IsCancellation for Cancelled {
    fn is_cancellation(&self) -> bool {
        true
    }
}
