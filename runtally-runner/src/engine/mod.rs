// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The interface between runtally and the engines that execute tests.
//!
//! An engine runs a set of test targets and reports each lifecycle event through an
//! [`EventSender`]. Once every target has finished, it resolves to an [`EngineTally`] that the run
//! driver cross-checks against the events it received.

mod discovery;
mod process;

use crate::{
    errors::EngineError,
    events::{EngineEvent, TestOutcome, UnhandledError, UnhandledErrorKind},
};
pub use discovery::*;
pub use process::*;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// An engine that executes tests and reports their outcomes.
pub trait TestEngine {
    /// Runs all tests, sending an event for each one as it finishes.
    ///
    /// Sending never blocks. The returned future resolves once all tests are done, or fails with
    /// a fatal error.
    fn run(self, events: EventSender) -> impl Future<Output = Result<EngineTally, EngineError>>;
}

/// Options forwarded unchanged to the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Stop starting new tests after the first failure.
    pub fail_fast: bool,

    /// Run tests one at a time.
    pub serial: bool,

    /// Modules to preload before each test.
    pub require: Vec<String>,
}

/// The counts an engine resolves with at the end of a run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineTally {
    /// The number of tests that passed.
    pub passed: usize,

    /// The number of tests that failed.
    pub failed: usize,

    /// The number of unhandled rejections.
    pub rejections: usize,

    /// The number of uncaught exceptions.
    pub exceptions: usize,

    /// The number of errors logged: failed tests plus unhandled errors.
    pub errors: usize,
}

impl EngineTally {
    /// Updates the tally with an event about to be sent.
    pub fn record(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::Test(outcome) if outcome.is_failure() => {
                self.failed += 1;
                self.errors += 1;
            }
            EngineEvent::Test(_) => self.passed += 1,
            EngineEvent::Error(error) => {
                match error.kind {
                    UnhandledErrorKind::Rejection => self.rejections += 1,
                    UnhandledErrorKind::Exception => self.exceptions += 1,
                }
                self.errors += 1;
            }
        }
    }
}

impl fmt::Display for EngineTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} rejections, {} exceptions, {} errors",
            self.passed, self.failed, self.rejections, self.exceptions, self.errors
        )
    }
}

/// The sending half of the channel that carries lifecycle events to the result aggregator.
///
/// Cloning the sender allows several tasks to report events concurrently. Events from a single
/// sender are delivered at most once, in order.
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: UnboundedSender<EngineEvent>,
}

/// An event was sent after the run driver stopped accepting events.
#[derive(Clone, Debug, Error)]
#[error("event sent after the run stopped accepting events")]
pub struct EventRejected(pub EngineEvent);

impl EventSender {
    /// Creates a new channel for lifecycle events.
    pub fn channel() -> (Self, UnboundedReceiver<EngineEvent>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Sends an event.
    pub fn send(&self, event: EngineEvent) -> Result<(), EventRejected> {
        self.sender
            .send(event)
            .map_err(|error| EventRejected(error.0))
    }

    /// Reports a finished test.
    pub fn send_test(&self, outcome: TestOutcome) -> Result<(), EventRejected> {
        self.send(EngineEvent::Test(outcome))
    }

    /// Reports an unhandled rejection or uncaught exception.
    pub fn send_error(&self, error: UnhandledError) -> Result<(), EventRejected> {
        self.send(EngineEvent::Error(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ErrorInfo;

    #[test]
    fn tally_records_events() {
        let mut tally = EngineTally::default();
        tally.record(&EngineEvent::Test(TestOutcome::passed("a")));
        tally.record(&EngineEvent::Test(TestOutcome::failed(
            "b",
            ErrorInfo::new("m", "s"),
        )));
        tally.record(&EngineEvent::Error(UnhandledError::exception(
            serde_json::Value::Null,
        )));
        assert_eq!(
            tally,
            EngineTally {
                passed: 1,
                failed: 1,
                rejections: 0,
                exceptions: 1,
                errors: 2,
            }
        );
        insta::assert_snapshot!(tally, @"1 passed, 1 failed, 0 rejections, 1 exceptions, 2 errors");
    }

    #[test]
    fn send_after_close_is_rejected() {
        let (sender, mut receiver) = EventSender::channel();
        sender.send_test(TestOutcome::passed("first")).unwrap();
        receiver.close();

        let err = sender
            .send_test(TestOutcome::passed("second"))
            .expect_err("receiver is closed");
        assert_eq!(err.0, EngineEvent::Test(TestOutcome::passed("second")));
        assert_eq!(
            receiver.try_recv().unwrap(),
            EngineEvent::Test(TestOutcome::passed("first"))
        );
    }
}
