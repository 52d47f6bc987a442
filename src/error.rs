// Copyright 2024 Chronicle Labs
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors returned synchronously by the spawn-time half of the scope API.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// The scope has already started (or finished) closing; no new child can
    /// be created on it.
    #[error("scope is closed")]
    ScopeClosed,
}

/// Defines an error's log level, mirroring the teacher's `ErrorLevel` trait so
/// that callers can report a scope's reconciled failure at a sensible level
/// without matching on its variants.
pub trait ErrorLevel: std::error::Error {
    /// Returns the log level this error should be reported at.
    fn level(&self) -> log::Level {
        log::Level::Error
    }
}

impl ErrorLevel for SpawnError {
    fn level(&self) -> log::Level {
        log::Level::Warn
    }
}

impl ErrorLevel for std::convert::Infallible {}
