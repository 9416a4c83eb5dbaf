// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An engine that runs each test target as a child process.

use super::{EngineConfig, EngineTally, EventSender, TestEngine, TestTarget, discover_targets};
use crate::{
    errors::EngineError,
    events::{EngineEvent, ErrorInfo, TestOutcome, UnhandledError},
};
use camino::{Utf8Path, Utf8PathBuf};
use future_queue::{FutureQueueContext, StreamExt};
use futures::prelude::*;
use std::{
    cell::Cell,
    env,
    ffi::OsString,
    num::NonZeroUsize,
    process::Stdio,
    rc::Rc,
};
use tokio::process::Command;
use tracing::{debug, warn};

/// The environment variable through which preload modules are passed to test targets.
pub const REQUIRE_ENV: &str = "RUNTALLY_REQUIRE";

/// Runs test targets as child processes.
///
/// A target passes if it exits with a zero status. Otherwise it fails, with the exit status as
/// the error message and its standard error as the stack. A target that cannot be started at all
/// is reported as an uncaught exception.
#[derive(Clone, Debug)]
pub struct ProcessEngine {
    cwd: Utf8PathBuf,
    patterns: Vec<String>,
    config: EngineConfig,
    parallelism: NonZeroUsize,
}

impl ProcessEngine {
    /// Creates a new engine that discovers targets matching `patterns` within `cwd`.
    pub fn new(cwd: impl Into<Utf8PathBuf>, patterns: Vec<String>, config: EngineConfig) -> Self {
        let parallelism = std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN);
        Self {
            cwd: cwd.into(),
            patterns,
            config,
            parallelism,
        }
    }

    /// Sets the number of targets run at once, unless the engine is configured to run serially.
    pub fn with_parallelism(mut self, parallelism: NonZeroUsize) -> Self {
        self.parallelism = parallelism;
        self
    }

    fn concurrency(&self) -> usize {
        if self.config.serial {
            1
        } else {
            self.parallelism.get()
        }
    }
}

impl TestEngine for ProcessEngine {
    async fn run(self, events: EventSender) -> Result<EngineTally, EngineError> {
        let targets = discover_targets(&self.cwd, &self.patterns)?;
        let require = require_env(&self.config.require)?;
        let concurrency = self.concurrency();
        let fail_fast = self.config.fail_fast;
        debug!(
            targets = targets.len(),
            concurrency, fail_fast, "starting test targets"
        );

        let cancelled = Rc::new(Cell::new(false));
        let cwd = self.cwd.as_path();
        let mut results = futures::stream::iter(targets)
            .map(|target| {
                let cancelled = cancelled.clone();
                let require = require.clone();
                let run = move |_cx: FutureQueueContext| run_target(cwd, target, require, cancelled);
                (1, run)
            })
            // Targets are started in order, but their results arrive in completion order.
            .future_queue(concurrency);

        let mut tally = EngineTally::default();
        while let Some(result) = results.next().await {
            let event = match result {
                TargetResult::Skipped(target) => {
                    debug!(target = %target.title, "skipping test target after failure");
                    continue;
                }
                TargetResult::Finished(outcome) => EngineEvent::Test(outcome),
                TargetResult::SpawnFailed { target, error } => {
                    EngineEvent::Error(UnhandledError::exception(serde_json::json!({
                        "target": target.title,
                        "message": error.to_string(),
                    })))
                }
            };

            let failed = match &event {
                EngineEvent::Test(outcome) => outcome.is_failure(),
                EngineEvent::Error(_) => true,
            };
            if failed && fail_fast && !cancelled.get() {
                debug!("fail-fast: not starting any more test targets");
                cancelled.set(true);
            }

            tally.record(&event);
            if let Err(error) = events.send(event) {
                warn!("{error}");
            }
        }

        Ok(tally)
    }
}

enum TargetResult {
    Skipped(TestTarget),
    Finished(TestOutcome),
    SpawnFailed {
        target: TestTarget,
        error: std::io::Error,
    },
}

async fn run_target(
    cwd: &Utf8Path,
    target: TestTarget,
    require: Option<OsString>,
    cancelled: Rc<Cell<bool>>,
) -> TargetResult {
    if cancelled.get() {
        return TargetResult::Skipped(target);
    }
    debug!(target = %target.title, "running test target");

    let mut command = Command::new(target.path.as_std_path());
    command
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(require) = &require {
        command.env(REQUIRE_ENV, require);
    }

    match command.output().await {
        Ok(output) => {
            if !output.stdout.is_empty() {
                debug!(
                    target = %target.title,
                    "test target stdout:\n{}",
                    String::from_utf8_lossy(&output.stdout)
                );
            }
            if output.status.success() {
                TargetResult::Finished(TestOutcome::passed(target.title))
            } else {
                let error = ErrorInfo::new(
                    output.status.to_string(),
                    String::from_utf8_lossy(&output.stderr),
                );
                TargetResult::Finished(TestOutcome::failed(target.title, error))
            }
        }
        Err(error) => TargetResult::SpawnFailed { target, error },
    }
}

/// Joins preload modules into a single environment variable value.
fn require_env(require: &[String]) -> Result<Option<OsString>, EngineError> {
    if require.is_empty() {
        return Ok(None);
    }
    for module in require {
        if let Err(error) = env::join_paths([module]) {
            return Err(EngineError::InvalidRequire {
                module: module.clone(),
                error,
            });
        }
    }
    env::join_paths(require)
        .map(Some)
        .map_err(|error| EngineError::InvalidRequire {
            module: require.join(" "),
            error,
        })
}
