// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The result aggregator: counters, the error log, and dispatch to the active output.

use super::{
    StackSummarizer, final_report::write_final_report, helpers::Styles,
    protocol::ProtocolEmitter, status::StatusLine,
};
use crate::{
    engine::EngineTally,
    errors::WriteEventError,
    events::{EngineEvent, ErrorLogEntry, TestOutcome, UnhandledError, UnhandledErrorKind},
};
use chrono::{DateTime, Local};
use debug_ignore::DebugIgnore;
use runtally_metadata::RuntallyExitCode;
use serde::Deserialize;
use std::{io::Write, time::Duration};
use tracing::debug;

/// How results are rendered. Chosen once at startup.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum RenderMode {
    /// A live status line while tests run, followed by a human-readable report on stderr.
    #[default]
    #[serde(rename = "human")]
    Interactive,

    /// One machine-readable record per line on stdout.
    #[serde(rename = "json")]
    Protocol,
}

/// The aggregate outcome of a run, as returned by [`FinalizedRun::write_report`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    /// The number of tests that passed.
    pub passed: usize,

    /// The number of tests that failed.
    pub failed: usize,

    /// The number of unhandled rejections.
    pub rejections: usize,

    /// The number of uncaught exceptions.
    pub exceptions: usize,

    /// Every failed test and unhandled error, in arrival order.
    pub errors: Vec<ErrorLogEntry>,
}

impl AggregateSummary {
    /// Returns true if any test failed or any unhandled error was observed.
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.rejections > 0 || self.exceptions > 0
    }

    /// Returns the process exit code for this run.
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            RuntallyExitCode::TEST_RUN_FAILED
        } else {
            RuntallyExitCode::OK
        }
    }

    /// Returns the counts in this summary as a tally, for comparison with the engine's.
    pub fn tally(&self) -> EngineTally {
        EngineTally {
            passed: self.passed,
            failed: self.failed,
            rejections: self.rejections,
            exceptions: self.exceptions,
            errors: self.errors.len(),
        }
    }
}

/// Where the aggregator sends rendered output.
#[derive(Debug)]
pub(super) enum ReportOutput<'a> {
    Interactive {
        status: StatusLine,
        writer: DebugIgnore<Box<dyn Write + 'a>>,
    },
    Protocol(ProtocolEmitter<'a>),
}

impl ReportOutput<'_> {
    fn abandon(self) {
        match self {
            Self::Interactive { mut status, mut writer } => {
                if let Err(error) = status.abandon(&mut *writer) {
                    debug!("error clearing status line after fatal error: {error}");
                }
            }
            Self::Protocol(_) => {}
        }
    }
}

/// Consumes lifecycle events for a single run, keeping counters and the error log.
///
/// Every event is counted before anything is written, so an output error never loses an event.
/// Created by [`ReporterBuilder::build`](super::ReporterBuilder::build).
#[derive(Debug)]
pub struct ResultAggregator<'a> {
    state: AggregateSummary,
    output: ReportOutput<'a>,
    summarizer: StackSummarizer,
    styles: Box<Styles>,
}

impl<'a> ResultAggregator<'a> {
    pub(super) fn new(
        output: ReportOutput<'a>,
        summarizer: StackSummarizer,
        styles: Box<Styles>,
    ) -> Self {
        Self {
            state: AggregateSummary::default(),
            output,
            summarizer,
            styles,
        }
    }

    /// Returns the render mode this aggregator was built with.
    pub fn render_mode(&self) -> RenderMode {
        match &self.output {
            ReportOutput::Interactive { .. } => RenderMode::Interactive,
            ReportOutput::Protocol(_) => RenderMode::Protocol,
        }
    }

    /// Called once when the run starts. In protocol mode, writes the start record.
    pub fn start(&mut self, start_time: DateTime<Local>) -> Result<(), WriteEventError> {
        match &mut self.output {
            ReportOutput::Interactive { .. } => Ok(()),
            ReportOutput::Protocol(emitter) => emitter.write_start(start_time),
        }
    }

    /// Dispatches a lifecycle event to [`on_test_event`](Self::on_test_event) or
    /// [`on_error_event`](Self::on_error_event).
    pub fn report_event(&mut self, event: EngineEvent) -> Result<(), WriteEventError> {
        match event {
            EngineEvent::Test(outcome) => self.on_test_event(outcome),
            EngineEvent::Error(error) => self.on_error_event(error),
        }
    }

    /// Records a finished test.
    pub fn on_test_event(&mut self, outcome: TestOutcome) -> Result<(), WriteEventError> {
        let Self {
            state,
            output,
            summarizer,
            styles,
        } = self;

        if outcome.is_failure() {
            state.failed += 1;
        } else {
            state.passed += 1;
        }

        let res = match output {
            ReportOutput::Interactive { status, writer } => status
                .update(state.passed, state.failed, styles, &mut **writer)
                .map_err(WriteEventError::Io),
            ReportOutput::Protocol(emitter) => emitter.write_test(&outcome, summarizer),
        };

        if outcome.is_failure() {
            state.errors.push(ErrorLogEntry::TestFailure(outcome));
        }
        res
    }

    /// Records an unhandled rejection or uncaught exception.
    ///
    /// In interactive mode the status line is left alone; the error shows up in the final report.
    pub fn on_error_event(&mut self, error: UnhandledError) -> Result<(), WriteEventError> {
        match error.kind {
            UnhandledErrorKind::Rejection => self.state.rejections += 1,
            UnhandledErrorKind::Exception => self.state.exceptions += 1,
        }

        let res = match &mut self.output {
            ReportOutput::Interactive { .. } => Ok(()),
            ReportOutput::Protocol(emitter) => emitter.write_unhandled(&error),
        };

        self.state.errors.push(ErrorLogEntry::Unhandled(error));
        res
    }

    /// Ends event collection, returning a snapshot of the run.
    ///
    /// This consumes the aggregator, so no event can be delivered after it.
    pub fn finalize(self) -> FinalizedRun<'a> {
        FinalizedRun {
            summary: self.state,
            output: self.output,
            summarizer: self.summarizer,
            styles: self.styles,
        }
    }

    /// Abandons the run after a fatal error. No summary or report is written.
    pub fn abandon(self) {
        self.output.abandon();
    }
}

/// A run whose events have all been collected, and which is ready to be reported.
#[derive(Debug)]
pub struct FinalizedRun<'a> {
    summary: AggregateSummary,
    output: ReportOutput<'a>,
    summarizer: StackSummarizer,
    styles: Box<Styles>,
}

impl FinalizedRun<'_> {
    /// Returns the aggregate summary of the run.
    pub fn summary(&self) -> &AggregateSummary {
        &self.summary
    }

    /// Writes the summary record (protocol mode) or the final report (interactive mode).
    pub fn write_report(self, elapsed: Duration) -> Result<AggregateSummary, WriteEventError> {
        match self.output {
            ReportOutput::Interactive {
                mut status,
                mut writer,
            } => {
                status.finish(&mut *writer).map_err(WriteEventError::Io)?;
                write_final_report(&self.summary, &self.summarizer, &self.styles, &mut *writer)
                    .map_err(WriteEventError::Io)?;
            }
            ReportOutput::Protocol(emitter) => emitter.finish(&self.summary, elapsed)?,
        }
        Ok(self.summary)
    }

    /// Abandons the run after a fatal error. No summary or report is written.
    pub fn abandon(self) {
        self.output.abandon();
    }
}
