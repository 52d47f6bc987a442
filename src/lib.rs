// Copyright 2024 Chronicle Labs
// SPDX-License-Identifier: Apache-2.0

//! `nursery` is a structured-concurrency scope for Tokio: a region that
//! cannot finish while any of its children are still running, with
//! cancellation flowing from parent to children rather than the other way
//! around.
//!
//! The entry point is [`Scope::open`]:
//!
//! ```no_run
//! use nursery::Scope;
//!
//! # #[derive(Debug, Clone)]
//! # struct MyError;
//! # impl nursery::IsCancellation for MyError {}
//! # impl From<nursery::SpawnError> for MyError {
//! #     fn from(_: nursery::SpawnError) -> Self { MyError }
//! # }
//! # async fn run() -> Result<(), MyError> {
//! Scope::open(|scope| async move {
//!     scope.spawn(|| async { Ok(()) })?;
//!     Ok(())
//! })
//! .await
//! # }
//! ```
//!
//! See `SPEC_FULL.md` for the full design this crate implements, and
//! `DESIGN.md` for where each piece of it is grounded.

#[cfg(feature = "demo")]
pub mod cli;
#[cfg(feature = "demo")]
pub mod config;

mod child;
mod error;
mod mask;
mod scope;
mod signal;
mod spawn;
mod state;
mod token;
mod wait;

pub use child::Thread;
pub use error::{ErrorLevel, SpawnError};
pub use mask::Unmask;
pub use scope::Scope;
pub use signal::{Cancelled, IsCancellation};
pub use token::ReasonedToken;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{Cancelled, IsCancellation, Scope, SpawnError};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum TestError {
        Boom,
        Cancelled,
    }

    impl IsCancellation for TestError {
        fn is_cancellation(&self) -> bool {
            matches!(self, TestError::Cancelled)
        }
    }

    impl From<Cancelled> for TestError {
        fn from(_: Cancelled) -> Self {
            TestError::Cancelled
        }
    }

    #[tokio::test]
    async fn open_with_no_children_succeeds() {
        let result: Result<i32, TestError> = Scope::open(|_scope| async { Ok(42) }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn body_failure_is_returned() {
        let result: Result<(), TestError> =
            Scope::open(|_scope| async { Err(TestError::Boom) }).await;
        assert_eq!(result, Err(TestError::Boom));
    }

    #[tokio::test]
    async fn open_waits_for_a_silent_child() {
        use std::sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        };

        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        let result: Result<(), TestError> = Scope::open(|scope| async move {
            scope
                .spawn_silent(move || async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    ran2.store(true, Ordering::SeqCst);
                    Ok::<_, TestError>(())
                })
                .unwrap();
            Ok(())
        })
        .await;

        assert_eq!(result, Ok(()));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn propagating_child_failure_surfaces_once_scope_closes() {
        let result: Result<(), TestError> = Scope::open(|scope| async move {
            scope.spawn(|| async { Err::<(), _>(TestError::Boom) }).unwrap();
            Ok(())
        })
        .await;

        assert_eq!(result, Err(TestError::Boom));
    }

    #[tokio::test]
    async fn silent_child_failure_does_not_surface() {
        let result: Result<(), TestError> = Scope::open(|scope| async move {
            scope.spawn_silent(|| async { Err::<(), _>(TestError::Boom) }).unwrap();
            Ok(())
        })
        .await;

        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn close_cancels_a_child_blocked_in_unmask() {
        let result: Result<(), TestError> = Scope::open(|scope| async move {
            scope
                .spawn_detached_with_unmask(|unmask| async move {
                    match unmask.unmask(std::future::pending::<()>()).await {
                        Ok(()) => Ok(()),
                        Err(cancelled) => Err(cancelled.into()),
                    }
                })
                .unwrap();
            Err(TestError::Boom)
        })
        .await;

        // The body's own failure wins over the child's cancellation-caused
        // one, but the scope still can't close until the child, woken by
        // `unmask`, actually exits.
        assert_eq!(result, Err(TestError::Boom));
    }

    #[tokio::test]
    async fn spawn_after_close_is_rejected() {
        use std::sync::{Arc, Mutex};

        let stashed_scope: Arc<Mutex<Option<Scope<TestError>>>> = Arc::new(Mutex::new(None));
        let stashed_scope2 = stashed_scope.clone();

        let _: Result<(), TestError> = Scope::open(|scope| async move {
            *stashed_scope2.lock().unwrap() = Some(scope);
            Ok(())
        })
        .await
        .unwrap();

        let scope = stashed_scope.lock().unwrap().take().unwrap();
        let err = scope.spawn_detached(|| async { Ok::<(), TestError>(()) }).unwrap_err();
        assert_eq!(err, SpawnError::ScopeClosed);
    }

    #[tokio::test]
    async fn wait_returns_once_children_finish() {
        let result: Result<(), TestError> = Scope::open(|scope| async move {
            scope
                .spawn_silent(|| async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok::<_, TestError>(())
                })
                .unwrap();
            assert!(!scope.wait_stm());
            scope.wait().await;
            assert!(scope.wait_stm());
            Ok(())
        })
        .await;

        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn join_for_times_out_on_a_slow_child() {
        let result: Result<(), TestError> = Scope::open(|scope| async move {
            let handle = scope
                .spawn_with_unmask(|unmask| async move {
                    match unmask.unmask(tokio::time::sleep(Duration::from_secs(3600))).await {
                        Ok(()) => Ok(()),
                        Err(cancelled) => Err(cancelled.into()),
                    }
                })
                .unwrap();
            let timed_out = handle.join_for(Duration::from_millis(5)).await;
            assert!(timed_out.is_none());
            Ok(())
        })
        .await;

        // The scope still cancels and reaps the slow child on close even
        // though the body moved on without waiting for it; the child's
        // resulting `Cancelled` is caused by this scope's own closing
        // signal, so it is filtered out rather than surfacing as a failure.
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn try_join_reflects_a_finished_child() {
        let result: Result<(), TestError> = Scope::open(|scope| async move {
            let handle = scope.spawn_silent(|| async { Ok::<_, TestError>(7) }).unwrap();
            assert_eq!(handle.try_join(), None);
            scope.wait().await;
            assert_eq!(handle.try_join(), Some(Ok(7)));
            Ok(())
        })
        .await;

        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn a_panicking_child_does_not_prevent_the_scope_from_closing() {
        let result: Result<(), TestError> = Scope::open(|scope| async move {
            let handle = scope
                .spawn_silent(|| async { if true { panic!("boom") } else { Ok::<(), TestError>(()) } })
                .unwrap();
            // The scope still waits for (and reaps) the panicked child
            // instead of hanging, but that child's own handle never
            // resolves — there is no `TestError` value to report a panic.
            let timed_out = handle.join_for(Duration::from_millis(50)).await;
            assert!(timed_out.is_none());
            Ok(())
        })
        .await;

        assert_eq!(result, Ok(()));
    }
}
