// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use runtally_runner::{
    engine::{EngineTally, EventSender, TestEngine},
    errors::EngineError,
    events::{EngineEvent, ErrorInfo, TestOutcome, UnhandledError},
};

#[derive(Clone, Debug)]
pub(crate) enum Step {
    Event(EngineEvent),
    Yield,
    Fail(&'static str),
}

impl Step {
    pub(crate) fn pass(title: &str) -> Self {
        Self::Event(EngineEvent::Test(TestOutcome::passed(title)))
    }

    pub(crate) fn fail(title: &str, message: &str) -> Self {
        Self::Event(EngineEvent::Test(TestOutcome::failed(
            title,
            ErrorInfo::new(message, format!("Error: {message}\n    at {title} (/srv/app/test.js:1:1)")),
        )))
    }

    pub(crate) fn exception(payload: serde_json::Value) -> Self {
        Self::Event(EngineEvent::Error(UnhandledError::exception(payload)))
    }

    pub(crate) fn rejection(payload: serde_json::Value) -> Self {
        Self::Event(EngineEvent::Error(UnhandledError::rejection(payload)))
    }
}

/// An engine that replays a fixed script of steps.
#[derive(Clone, Debug, Default)]
pub(crate) struct ScriptedEngine {
    steps: Vec<Step>,
    tally_override: Option<EngineTally>,
}

impl ScriptedEngine {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            tally_override: None,
        }
    }

    /// Resolves with `tally` instead of the tally of the events actually sent.
    pub(crate) fn with_tally(mut self, tally: EngineTally) -> Self {
        self.tally_override = Some(tally);
        self
    }
}

impl TestEngine for ScriptedEngine {
    async fn run(self, events: EventSender) -> Result<EngineTally, EngineError> {
        let mut tally = EngineTally::default();
        for step in self.steps {
            match step {
                Step::Event(event) => {
                    tally.record(&event);
                    events.send(event).expect("driver accepts events while running");
                }
                Step::Yield => tokio::task::yield_now().await,
                Step::Fail(message) => return Err(EngineError::bootstrap(message)),
            }
        }
        Ok(self.tally_override.unwrap_or(tally))
    }
}

/// An engine that runs several scripts concurrently, each with its own sender.
#[derive(Clone, Debug, Default)]
pub(crate) struct ConcurrentEngine {
    workers: Vec<Vec<Step>>,
}

impl ConcurrentEngine {
    pub(crate) fn new(workers: Vec<Vec<Step>>) -> Self {
        Self { workers }
    }
}

impl TestEngine for ConcurrentEngine {
    async fn run(self, events: EventSender) -> Result<EngineTally, EngineError> {
        let workers = self.workers.into_iter().map(|steps| {
            let events = events.clone();
            async move { ScriptedEngine::new(steps).run(events).await }
        });
        let tallies = futures::future::try_join_all(workers).await?;
        Ok(tallies
            .into_iter()
            .fold(EngineTally::default(), |acc, tally| EngineTally {
                passed: acc.passed + tally.passed,
                failed: acc.failed + tally.failed,
                rejections: acc.rejections + tally.rejections,
                exceptions: acc.exceptions + tally.exceptions,
                errors: acc.errors + tally.errors,
            }))
    }
}
