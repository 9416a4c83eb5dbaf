// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The run driver.
//!
//! The driver starts the execution engine, feeds every lifecycle event it produces to the result
//! aggregator, and finally has the aggregator report the run. A run moves through these phases:
//!
//! ```text
//! idle -> running -> draining -> reporting -> exited
//!            |           |
//!            +-----------+------------------------> exited (fatal error)
//! ```

use crate::{
    engine::{EventSender, TestEngine},
    errors::RunnerError,
    reporter::{AggregateSummary, ResultAggregator},
    time::stopwatch,
};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::debug;

/// A phase of a test run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunPhase {
    /// The run hasn't started.
    Idle,

    /// The engine is running and events are being delivered.
    Running,

    /// The engine has finished. Events already sent are being delivered.
    Draining,

    /// The final summary or report is being written.
    Reporting,

    /// The run is over.
    Exited,
}

impl RunPhase {
    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Draining | Self::Exited)
                | (Self::Draining, Self::Reporting | Self::Exited)
                | (Self::Reporting, Self::Exited)
        )
    }
}

/// The result of a run that completed normally.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// The aggregate summary of the run.
    pub summary: AggregateSummary,

    /// How long the run took.
    pub elapsed: Duration,
}

impl RunOutcome {
    /// Returns the process exit code for this run.
    pub fn exit_code(&self) -> i32 {
        self.summary.exit_code()
    }
}

/// Drives a single test run to completion on a current-thread async runtime.
#[derive(Debug)]
pub struct RunDriver {
    runtime: Runtime,
    phase: RunPhase,
}

impl RunDriver {
    /// Creates a new driver.
    pub fn new() -> Result<Self, RunnerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(RunnerError::RuntimeCreate)?;
        Ok(Self {
            runtime,
            phase: RunPhase::Idle,
        })
    }

    /// Returns the current phase of the run.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Runs `engine` to completion, reporting its events through `aggregator`.
    ///
    /// On success, the summary or final report has been written. On failure, normal reporting was
    /// skipped and the returned error is the only thing left to print.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn execute<E: TestEngine>(
        &mut self,
        engine: E,
        mut aggregator: ResultAggregator<'_>,
    ) -> Result<RunOutcome, RunnerError> {
        let stopwatch = stopwatch();
        self.transition(RunPhase::Running);

        if let Err(err) = aggregator.start(stopwatch.start_time()) {
            return Err(self.abort(aggregator, err.into()));
        }

        let (sender, mut receiver) = EventSender::channel();
        let res = self.runtime.block_on(async {
            let run = engine.run(sender);
            tokio::pin!(run);
            loop {
                tokio::select! {
                    // Deliver events that have already been sent before noticing that the engine
                    // is done.
                    biased;

                    Some(event) = receiver.recv() => {
                        if let Err(err) = aggregator.report_event(event) {
                            return Err(err);
                        }
                    }
                    res = &mut run => return Ok(res),
                }
            }
        });

        let tally = match res {
            Ok(Ok(tally)) => tally,
            Ok(Err(err)) => return Err(self.abort(aggregator, err.into())),
            Err(err) => return Err(self.abort(aggregator, RunnerError::WriteEvent(err))),
        };

        self.transition(RunPhase::Draining);
        receiver.close();
        while let Ok(event) = receiver.try_recv() {
            if let Err(err) = aggregator.report_event(event) {
                return Err(self.abort(aggregator, err.into()));
            }
        }

        self.transition(RunPhase::Reporting);
        let finalized = aggregator.finalize();
        let observed = finalized.summary().tally();
        if observed != tally {
            finalized.abandon();
            return Err(self.exit_with(RunnerError::TallyMismatch {
                engine: tally,
                observed,
            }));
        }

        let elapsed = stopwatch.snapshot().duration;
        let summary = match finalized.write_report(elapsed) {
            Ok(summary) => summary,
            Err(err) => return Err(self.exit_with(err.into())),
        };

        self.transition(RunPhase::Exited);
        debug!(
            passed = summary.passed,
            failed = summary.failed,
            rejections = summary.rejections,
            exceptions = summary.exceptions,
            "run finished in {elapsed:?}"
        );
        Ok(RunOutcome { summary, elapsed })
    }

    fn abort(&mut self, aggregator: ResultAggregator<'_>, err: RunnerError) -> RunnerError {
        aggregator.abandon();
        self.exit_with(err)
    }

    fn exit_with(&mut self, err: RunnerError) -> RunnerError {
        debug!("aborting run from phase {:?}: {err}", self.phase);
        self.transition(RunPhase::Exited);
        err
    }

    fn transition(&mut self, next: RunPhase) {
        if !self.phase.can_transition_to(next) {
            panic!(
                "illegal state transition: {:?} -> {:?}",
                self.phase, next
            );
        }
        debug!("run phase: {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }
}
