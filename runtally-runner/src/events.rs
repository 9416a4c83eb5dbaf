// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle events produced by execution engines.
//!
//! An engine reports each finished test as a [`TestOutcome`], and each error that cannot be
//! attributed to a single test as an [`UnhandledError`]. Both are immutable once sent.

pub use runtally_metadata::UnhandledErrorKind;
use serde::Serialize;

/// A lifecycle event emitted by an execution engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    /// A test finished.
    Test(TestOutcome),

    /// An unhandled rejection or uncaught exception was observed.
    Error(UnhandledError),
}

/// The outcome of a single completed test.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub struct TestOutcome {
    /// The title of the test.
    pub title: String,

    /// The error the test failed with, or `None` if it passed.
    pub error: Option<ErrorInfo>,
}

impl TestOutcome {
    /// Creates a passing outcome.
    pub fn passed(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            error: None,
        }
    }

    /// Creates a failing outcome.
    pub fn failed(title: impl Into<String>, error: ErrorInfo) -> Self {
        Self {
            title: title.into(),
            error: Some(error),
        }
    }

    /// Returns true if the test failed.
    #[inline]
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// The error a test failed with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub struct ErrorInfo {
    /// The error message.
    pub message: String,

    /// The raw, unsummarized stack trace.
    pub stack: String,
}

impl ErrorInfo {
    /// Creates a new `ErrorInfo`.
    pub fn new(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: stack.into(),
        }
    }
}

/// An error not attributable to a single test.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnhandledError {
    /// Whether this was a rejection or an exception.
    pub kind: UnhandledErrorKind,

    /// The payload, as reported by the engine.
    pub payload: serde_json::Value,
}

impl UnhandledError {
    /// Creates a new unhandled error.
    pub fn new(kind: UnhandledErrorKind, payload: serde_json::Value) -> Self {
        Self { kind, payload }
    }

    /// Creates an unhandled rejection.
    pub fn rejection(payload: serde_json::Value) -> Self {
        Self::new(UnhandledErrorKind::Rejection, payload)
    }

    /// Creates an uncaught exception.
    pub fn exception(payload: serde_json::Value) -> Self {
        Self::new(UnhandledErrorKind::Exception, payload)
    }
}

/// An entry in the error log kept by the result aggregator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorLogEntry {
    /// A failed test.
    TestFailure(TestOutcome),

    /// An unhandled rejection or uncaught exception.
    Unhandled(UnhandledError),
}
