// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::RecordParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single line of runtally's machine-readable output.
///
/// Every record serializes to a JSON object whose first key is `"type"`, so consumers can tell
/// record kinds apart by their leading token alone:
///
/// * `{"type":"start",...}` is written exactly once, before any other record.
/// * `{"type":"test",...}` is written once per finished test.
/// * `{"type":"error",...}` is written once per unhandled rejection or uncaught exception.
/// * `{"type":"summary",...}` is written exactly once, at the end of the run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProtocolRecord {
    /// The run started.
    Start(StartRecord),

    /// A test finished.
    Test(TestRecord),

    /// An error not attributable to a single test was observed.
    Error(UnhandledErrorRecord),

    /// The run finished.
    Summary(SummaryRecord),
}

impl ProtocolRecord {
    /// Parses a complete protocol stream, one record per line.
    ///
    /// Blank lines are skipped.
    pub fn parse_lines(input: &str) -> Result<Vec<Self>, RecordParseError> {
        input
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line).map_err(|error| RecordParseError::new(idx + 1, error))
            })
            .collect()
    }
}

/// The first record of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRecord {
    /// The format version, in the form `<major>.<minor>`.
    pub version: String,

    /// The time at which the run started, in RFC 3339 format.
    pub timestamp: String,
}

/// The outcome of a single test.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    /// Whether the test passed.
    pub event: RecordStatus,

    /// The 1-based index of this record among test and error records.
    pub index: usize,

    /// The title of the test.
    pub name: String,

    /// The error message, for failed tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// The summarized stack trace, for failed tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// An unhandled rejection or uncaught exception.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnhandledErrorRecord {
    /// The 1-based index of this record among test and error records.
    pub index: usize,

    /// The kind of error.
    pub kind: UnhandledErrorKind,

    /// The payload reported by the engine, verbatim.
    pub payload: serde_json::Value,
}

/// The last record of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// `ok` if nothing failed, `failed` otherwise.
    pub event: RecordStatus,

    /// The number of tests that passed.
    pub passed: usize,

    /// The number of tests that failed.
    pub failed: usize,

    /// The number of unhandled rejections.
    pub rejections: usize,

    /// The number of uncaught exceptions.
    pub exceptions: usize,

    /// The wall-clock duration of the run, in seconds.
    pub exec_time: f64,
}

/// Pass/fail status for test and summary records.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordStatus {
    /// Success.
    Ok,

    /// Failure.
    Failed,
}

impl RecordStatus {
    /// Returns `Ok` if `failed` is false, `Failed` otherwise.
    pub fn from_failed(failed: bool) -> Self {
        if failed { Self::Failed } else { Self::Ok }
    }
}

/// The kind of an error that is not attributable to the completion of a single test.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnhandledErrorKind {
    /// An asynchronous operation failed and nothing handled the failure.
    Rejection,

    /// An exception escaped all handlers.
    Exception,
}

impl UnhandledErrorKind {
    /// Returns a string representation of this kind, as used in protocol records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rejection => "rejection",
            Self::Exception => "exception",
        }
    }
}

impl fmt::Display for UnhandledErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "proptest1")]
mod proptest_impls {
    use super::UnhandledErrorKind;
    use proptest::prelude::*;

    impl Arbitrary for UnhandledErrorKind {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
            prop_oneof![Just(Self::Rejection), Just(Self::Exception)].boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use test_case::test_case;

    #[test]
    fn parse_stream() {
        let input = indoc! {r#"
            {"type":"start","version":"0.1","timestamp":"2024-01-01T00:00:00+00:00"}
            {"type":"test","event":"ok","index":1,"name":"adds"}

            {"type":"test","event":"failed","index":2,"name":"subtracts","message":"x","stack":"at foo"}
            {"type":"error","index":3,"kind":"exception","payload":{"message":"boom"}}
            {"type":"summary","event":"failed","passed":1,"failed":1,"rejections":0,"exceptions":1,"exec_time":0.25}
        "#};

        let records = ProtocolRecord::parse_lines(input).expect("stream is valid");
        assert_eq!(records.len(), 5);
        assert!(matches!(&records[0], ProtocolRecord::Start(start) if start.version == "0.1"));
        assert_eq!(
            records[2],
            ProtocolRecord::Test(TestRecord {
                event: RecordStatus::Failed,
                index: 2,
                name: "subtracts".to_owned(),
                message: Some("x".to_owned()),
                stack: Some("at foo".to_owned()),
            })
        );
        match &records[4] {
            ProtocolRecord::Summary(summary) => {
                assert_eq!(summary.event, RecordStatus::Failed);
                assert_eq!(summary.exceptions, 1);
            }
            other => panic!("expected summary, found {other:?}"),
        }
    }

    #[test]
    fn parse_error_reports_line() {
        let input = "{\"type\":\"start\",\"version\":\"0.1\",\"timestamp\":\"t\"}\nnot json\n";
        let error = ProtocolRecord::parse_lines(input).expect_err("second line is invalid");
        assert_eq!(error.line_number(), 2);
    }

    #[test_case(ProtocolRecord::Start(StartRecord { version: "0.1".to_owned(), timestamp: "t".to_owned() }), r#"{"type":"start""#; "start")]
    #[test_case(ProtocolRecord::Test(TestRecord { event: RecordStatus::Ok, index: 1, name: "a".to_owned(), message: None, stack: None }), r#"{"type":"test""#; "test")]
    #[test_case(ProtocolRecord::Error(UnhandledErrorRecord { index: 1, kind: UnhandledErrorKind::Rejection, payload: serde_json::Value::Null }), r#"{"type":"error""#; "error")]
    #[test_case(ProtocolRecord::Summary(SummaryRecord { event: RecordStatus::Ok, passed: 0, failed: 0, rejections: 0, exceptions: 0, exec_time: 0.0 }), r#"{"type":"summary""#; "summary")]
    fn leading_token(record: ProtocolRecord, prefix: &str) {
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.starts_with(prefix), "{line} starts with {prefix}");
    }

    #[test]
    fn passing_test_omits_error_fields() {
        let record = ProtocolRecord::Test(TestRecord {
            event: RecordStatus::Ok,
            index: 4,
            name: "works".to_owned(),
            message: None,
            stack: None,
        });
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"type":"test","event":"ok","index":4,"name":"works"}"#
        );
    }
}
