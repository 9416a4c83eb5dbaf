// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the run driver, using scripted engines.

mod fake_engine;

use fake_engine::{ConcurrentEngine, ScriptedEngine, Step};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use runtally_metadata::{ProtocolRecord, RecordStatus};
use runtally_runner::{
    engine::{EngineTally, TestEngine},
    errors::{EngineError, RunnerError},
    events::{EngineEvent, ErrorLogEntry},
    reporter::{RenderMode, ReporterBuilder, ReporterStderr, ReporterStdout, ShowStatus},
    runner::{RunDriver, RunOutcome, RunPhase},
};
use serde_json::json;

struct Captured {
    result: Result<RunOutcome, RunnerError>,
    phase: RunPhase,
    stdout: String,
    stderr: String,
}

impl Captured {
    fn records(&self) -> Vec<ProtocolRecord> {
        ProtocolRecord::parse_lines(&self.stdout).expect("stdout is a valid protocol stream")
    }
}

fn run(mode: RenderMode, engine: impl TestEngine) -> Captured {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut builder = ReporterBuilder::default();
    builder
        .set_render_mode(mode)
        .set_show_status(ShowStatus::Lines)
        .set_framework_dirs(["/usr/lib/runtally"]);

    let aggregator = builder.build(
        ReporterStdout::Buffer(&mut stdout),
        ReporterStderr::Buffer(&mut stderr),
    );
    let mut driver = RunDriver::new().expect("runtime created");
    assert_eq!(driver.phase(), RunPhase::Idle);
    let result = driver.execute(engine, aggregator);

    Captured {
        result,
        phase: driver.phase(),
        stdout: String::from_utf8(stdout).unwrap(),
        stderr: String::from_utf8(stderr).unwrap(),
    }
}

#[test]
fn interactive_two_pass_one_fail() {
    let engine = ScriptedEngine::new([
        Step::pass("adds"),
        Step::Yield,
        Step::pass("subtracts"),
        Step::fail("divides", "division by zero"),
    ]);
    let captured = run(RenderMode::Interactive, engine);
    let outcome = captured.result.expect("run completed");

    assert_eq!(captured.phase, RunPhase::Exited);
    assert_eq!(
        (
            outcome.summary.passed,
            outcome.summary.failed,
            outcome.summary.rejections,
            outcome.summary.exceptions
        ),
        (2, 1, 0, 0)
    );
    match &outcome.summary.errors[..] {
        [ErrorLogEntry::TestFailure(outcome)] => assert_eq!(outcome.title, "divides"),
        other => panic!("unexpected error log: {other:?}"),
    }
    assert_eq!(outcome.exit_code(), 1);

    assert_eq!(captured.stdout, "");
    assert_eq!(
        captured.stderr,
        concat!(
            "  1 passed\n",
            "  2 passed\n",
            "  2 passed  1 failed\n",
            "\n",
            "  1.divides\n",
            "  Error: division by zero\n",
            "      at divides (/srv/app/test.js:1:1)\n",
            "\n",
        )
    );
}

#[test]
fn protocol_zero_tests_one_exception() {
    let engine = ScriptedEngine::new([Step::exception(json!({"message": "boom"}))]);
    let captured = run(RenderMode::Protocol, engine);
    let outcome = captured.result.as_ref().expect("run completed");
    assert_eq!(outcome.exit_code(), 1);
    assert!(captured.stderr.is_empty(), "nothing on stderr: {}", captured.stderr);

    let records = captured.records();
    assert_eq!(records.len(), 3);
    assert!(matches!(records[0], ProtocolRecord::Start(_)));
    match &records[1] {
        ProtocolRecord::Error(error) => {
            assert_eq!(error.index, 1);
            assert_eq!(error.payload, json!({"message": "boom"}));
        }
        other => panic!("expected error record, found {other:?}"),
    }
    match &records[2] {
        ProtocolRecord::Summary(summary) => {
            assert_eq!(summary.event, RecordStatus::Failed);
            assert_eq!(
                (summary.passed, summary.failed, summary.rejections, summary.exceptions),
                (0, 0, 0, 1)
            );
        }
        other => panic!("expected summary record, found {other:?}"),
    }
}

#[test]
fn protocol_zero_tests() {
    let captured = run(RenderMode::Protocol, ScriptedEngine::default());
    assert_eq!(captured.result.as_ref().unwrap().exit_code(), 0);

    let records = captured.records();
    let starts = records
        .iter()
        .filter(|r| matches!(r, ProtocolRecord::Start(_)))
        .count();
    assert_eq!(starts, 1);
    match &records[..] {
        [ProtocolRecord::Start(_), ProtocolRecord::Summary(summary)] => {
            assert_eq!(summary.event, RecordStatus::Ok);
            assert_eq!(
                (summary.passed, summary.failed, summary.rejections, summary.exceptions),
                (0, 0, 0, 0)
            );
        }
        other => panic!("unexpected records: {other:?}"),
    }
}

#[test]
fn fatal_error_before_any_event() {
    for mode in [RenderMode::Interactive, RenderMode::Protocol] {
        let captured = run(mode, ScriptedEngine::new([Step::Fail("couldn't find any files to test")]));
        let err = captured.result.as_ref().expect_err("run failed");
        assert!(
            matches!(err, RunnerError::Engine(EngineError::Bootstrap { .. })),
            "{err:?}"
        );
        assert_eq!(err.to_string(), "couldn't find any files to test");
        assert_eq!(captured.phase, RunPhase::Exited);
        assert!(captured.stderr.is_empty(), "no report: {}", captured.stderr);

        let has_summary = captured
            .records()
            .iter()
            .any(|r| matches!(r, ProtocolRecord::Summary(_)));
        assert!(!has_summary, "no summary record for {mode:?}");
    }
}

#[test]
fn fatal_error_after_events_skips_report() {
    let engine = ScriptedEngine::new([
        Step::fail("first", "nope"),
        Step::Yield,
        Step::Fail("worker crashed"),
    ]);
    let captured = run(RenderMode::Interactive, engine);
    assert!(captured.result.is_err());
    assert_eq!(captured.stderr, "  1 failed\n", "only the status line was written");
}

#[test]
fn tally_mismatch_is_fatal() {
    let engine = ScriptedEngine::new([Step::pass("a")]).with_tally(EngineTally {
        passed: 2,
        errors: 0,
        ..Default::default()
    });
    let captured = run(RenderMode::Protocol, engine);
    let err = captured.result.as_ref().expect_err("mismatch is fatal");
    match err {
        RunnerError::TallyMismatch { engine, observed } => {
            assert_eq!(engine.passed, 2);
            assert_eq!(observed.passed, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let records = captured.records();
    assert_eq!(records.len(), 2, "start and test records only: {records:?}");
}

#[test]
fn concurrent_senders() {
    let engine = ConcurrentEngine::new(vec![
        vec![Step::pass("a1"), Step::Yield, Step::fail("a2", "x"), Step::Yield],
        vec![Step::rejection(json!("lost")), Step::Yield, Step::pass("b1")],
        vec![Step::Yield, Step::pass("c1"), Step::exception(json!(null))],
    ]);
    let captured = run(RenderMode::Protocol, engine);
    let outcome = captured.result.as_ref().expect("run completed");
    assert_eq!(
        outcome.summary.tally(),
        EngineTally {
            passed: 3,
            failed: 1,
            rejections: 1,
            exceptions: 1,
            errors: 3,
        }
    );

    // Indices are unique and contiguous, whatever the interleaving.
    let mut indices: Vec<usize> = captured
        .records()
        .iter()
        .filter_map(|record| match record {
            ProtocolRecord::Test(test) => Some(test.index),
            ProtocolRecord::Error(error) => Some(error.index),
            _ => None,
        })
        .collect();
    indices.sort_unstable();
    assert_eq!(indices, (1..=6).collect::<Vec<_>>());
}

#[test]
#[should_panic(expected = "illegal state transition")]
fn driver_runs_once() {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let builder = ReporterBuilder::default();
    let mut driver = RunDriver::new().unwrap();

    let aggregator = builder.build(
        ReporterStdout::Buffer(&mut stdout),
        ReporterStderr::Buffer(&mut stderr),
    );
    driver
        .execute(ScriptedEngine::default(), aggregator)
        .unwrap();

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let aggregator = builder.build(
        ReporterStdout::Buffer(&mut stdout),
        ReporterStderr::Buffer(&mut stderr),
    );
    let _ = driver.execute(ScriptedEngine::default(), aggregator);
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => "[a-z]{1,8}".prop_map(|title| Step::pass(&title)),
        2 => "[a-z]{1,8}".prop_map(|title| Step::fail(&title, "failed")),
        1 => Just(Step::rejection(json!("r"))),
        1 => Just(Step::exception(json!("e"))),
        2 => Just(Step::Yield),
    ]
}

proptest! {
    #[test]
    fn every_event_is_counted_once(steps in prop::collection::vec(arb_step(), 0..40)) {
        let events: Vec<EngineEvent> = steps
            .iter()
            .filter_map(|step| match step {
                Step::Event(event) => Some(event.clone()),
                _ => None,
            })
            .collect();
        let tests = events.iter().filter(|e| matches!(e, EngineEvent::Test(_))).count();
        let errors = events.len() - events
            .iter()
            .filter(|e| matches!(e, EngineEvent::Test(outcome) if !outcome.is_failure()))
            .count();

        for mode in [RenderMode::Interactive, RenderMode::Protocol] {
            let captured = run(mode, ScriptedEngine::new(steps.clone()));
            let outcome = captured.result.expect("run completed");
            prop_assert_eq!(outcome.summary.passed + outcome.summary.failed, tests);
            prop_assert_eq!(outcome.summary.errors.len(), errors);
        }
    }
}
