// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The machine-readable, line-oriented report format.
//!
//! Each record is written as a single line of JSON and flushed immediately, so consumers can
//! follow a run as it happens. See [`ProtocolRecord`] for the list of records.

use super::{AggregateSummary, StackSummarizer};
use crate::{
    errors::{FormatVersionError, FormatVersionErrorInner, WriteEventError},
    events::{TestOutcome, UnhandledError},
};
use chrono::{DateTime, Local};
use debug_ignore::DebugIgnore;
use runtally_metadata::{
    ProtocolRecord, RecordStatus, StartRecord, SummaryRecord, TestRecord, UnhandledErrorRecord,
};
use std::{fmt, io::Write, time::Duration};

/// To support pinning the version of the output, this enum documents changes to the format.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
enum FormatMinorVersion {
    /// The first version of the format.
    ///
    /// * `{"type":"start","version":"0.1","timestamp":"<rfc3339>"}` - always printed first
    /// * `{"type":"test","event":"ok","index":<n>,"name":"<title>"}` - printed for a passing test
    /// * `{"type":"test","event":"failed","index":<n>,"name":"<title>","message":"<message>","stack":"<summarized stack>"}`
    ///   - printed for a failing test
    /// * `{"type":"error","index":<n>,"kind":"rejection"|"exception","payload":<json>}` - printed
    ///   for an unhandled rejection or an uncaught exception
    /// * `{"type":"summary","event":"ok"|"failed","passed":<n>,"failed":<n>,"rejections":<n>,"exceptions":<n>,"exec_time":<f64>}`
    ///   - always printed last, unless the run was aborted by a fatal error
    First = 1,
    #[doc(hidden)]
    _Max,
}

/// The format is unstable until it reaches a major version of 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
enum FormatMajorVersion {
    /// The format is unstable.
    Unstable = 0,
    #[doc(hidden)]
    _Max,
}

/// A validated version of the machine-readable format.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FormatVersion {
    major: FormatMajorVersion,
    minor: FormatMinorVersion,
}

impl FormatVersion {
    /// The latest version of the format.
    pub const LATEST: Self = Self {
        major: FormatMajorVersion::Unstable,
        minor: FormatMinorVersion::First,
    };

    /// Parses a version of the form `<major>.<minor>`.
    ///
    /// If `version` is `None`, the latest version is returned.
    pub fn parse(version: Option<&str>) -> Result<Self, FormatVersionError> {
        let Some(version) = version else {
            return Ok(Self::LATEST);
        };
        let Some((major, minor)) = version.split_once('.') else {
            return Err(FormatVersionError {
                input: version.into(),
                err: FormatVersionErrorInner::InvalidFormat {
                    expected: "<major>.<minor>",
                },
            });
        };

        let major: u8 = major.parse().map_err(|err| FormatVersionError {
            input: version.into(),
            err: FormatVersionErrorInner::InvalidInteger {
                which: "major",
                err,
            },
        })?;

        let minor: u8 = minor.parse().map_err(|err| FormatVersionError {
            input: version.into(),
            err: FormatVersionErrorInner::InvalidInteger {
                which: "minor",
                err,
            },
        })?;

        let major = match major {
            0 => FormatMajorVersion::Unstable,
            o => {
                return Err(FormatVersionError {
                    input: version.into(),
                    err: FormatVersionErrorInner::InvalidValue {
                        which: "major",
                        value: o,
                        range: (FormatMajorVersion::Unstable as u8)
                            ..(FormatMajorVersion::_Max as u8),
                    },
                });
            }
        };

        let minor = match minor {
            1 => FormatMinorVersion::First,
            o => {
                return Err(FormatVersionError {
                    input: version.into(),
                    err: FormatVersionErrorInner::InvalidValue {
                        which: "minor",
                        value: o,
                        range: (FormatMinorVersion::First as u8)..(FormatMinorVersion::_Max as u8),
                    },
                });
            }
        };

        Ok(Self { major, minor })
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::LATEST
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major as u8, self.minor as u8)
    }
}

/// Writes protocol records to an output stream.
///
/// The start record is written before anything else. The summary record is written by
/// [`finish`](Self::finish), which consumes the emitter.
#[derive(Debug)]
pub(super) struct ProtocolEmitter<'a> {
    version: FormatVersion,
    writer: DebugIgnore<Box<dyn Write + 'a>>,
    next_index: usize,
    started: bool,
}

impl<'a> ProtocolEmitter<'a> {
    pub(super) fn new(version: FormatVersion, writer: Box<dyn Write + 'a>) -> Self {
        Self {
            version,
            writer: DebugIgnore(writer),
            next_index: 1,
            started: false,
        }
    }

    pub(super) fn write_start(&mut self, start_time: DateTime<Local>) -> Result<(), WriteEventError> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        let record = ProtocolRecord::Start(StartRecord {
            version: self.version.to_string(),
            timestamp: start_time.to_rfc3339(),
        });
        self.write_record(&record)
    }

    pub(super) fn write_test(
        &mut self,
        outcome: &TestOutcome,
        summarizer: &StackSummarizer,
    ) -> Result<(), WriteEventError> {
        self.write_start(Local::now())?;
        let record = ProtocolRecord::Test(TestRecord {
            event: RecordStatus::from_failed(outcome.is_failure()),
            index: self.take_index(),
            name: outcome.title.clone(),
            message: outcome.error.as_ref().map(|error| error.message.clone()),
            stack: outcome
                .error
                .as_ref()
                .map(|error| summarizer.summarize(&error.stack)),
        });
        self.write_record(&record)
    }

    pub(super) fn write_unhandled(&mut self, error: &UnhandledError) -> Result<(), WriteEventError> {
        self.write_start(Local::now())?;
        let record = ProtocolRecord::Error(UnhandledErrorRecord {
            index: self.take_index(),
            kind: error.kind,
            payload: error.payload.clone(),
        });
        self.write_record(&record)
    }

    pub(super) fn finish(
        mut self,
        summary: &AggregateSummary,
        elapsed: Duration,
    ) -> Result<(), WriteEventError> {
        self.write_start(Local::now())?;
        let record = ProtocolRecord::Summary(SummaryRecord {
            event: RecordStatus::from_failed(summary.has_failures()),
            passed: summary.passed,
            failed: summary.failed,
            rejections: summary.rejections,
            exceptions: summary.exceptions,
            exec_time: elapsed.as_secs_f64(),
        });
        self.write_record(&record)
    }

    fn take_index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn write_record(&mut self, record: &ProtocolRecord) -> Result<(), WriteEventError> {
        let mut line = serde_json::to_vec(record)
            .map_err(|error| WriteEventError::Io(std::io::Error::other(error)))?;
        line.push(b'\n');
        self.writer.write_all(&line).map_err(WriteEventError::Io)?;
        self.writer.flush().map_err(WriteEventError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ErrorInfo;
    use test_case::test_case;

    #[test_case(None, Ok(FormatVersion::LATEST) ; "default")]
    #[test_case(Some("0.1"), Ok(FormatVersion::LATEST) ; "explicit")]
    #[test_case(Some("1"), Err("expected format version in form of `<major>.<minor>`") ; "no dot")]
    #[test_case(Some("x.1"), Err("version component `major` could not be parsed as an integer") ; "bad major")]
    #[test_case(Some("1.1"), Err("version component `major` value 1 is out of range 0..1") ; "major out of range")]
    #[test_case(Some("0.2"), Err("version component `minor` value 2 is out of range 1..2") ; "minor out of range")]
    fn parse_version(input: Option<&str>, expected: Result<FormatVersion, &str>) {
        let actual = FormatVersion::parse(input).map_err(|err| err.err.to_string());
        assert_eq!(actual, expected.map_err(str::to_owned));
    }

    #[test]
    fn version_display() {
        assert_eq!(FormatVersion::LATEST.to_string(), "0.1");
    }

    #[test]
    fn indices_are_shared() {
        let mut out = Vec::new();
        let summarizer = StackSummarizer::default();
        {
            let mut emitter = ProtocolEmitter::new(FormatVersion::LATEST, Box::new(&mut out));
            emitter
                .write_test(&TestOutcome::passed("first"), &summarizer)
                .unwrap();
            emitter
                .write_unhandled(&UnhandledError::rejection(serde_json::json!("nope")))
                .unwrap();
            emitter
                .write_test(
                    &TestOutcome::failed("third", ErrorInfo::new("bad", "Error: bad\n    at x")),
                    &summarizer,
                )
                .unwrap();
        }

        let records = ProtocolRecord::parse_lines(std::str::from_utf8(&out).unwrap()).unwrap();
        assert_eq!(records.len(), 4, "start record is written lazily");
        assert!(matches!(records[0], ProtocolRecord::Start(_)));
        assert!(matches!(&records[1], ProtocolRecord::Test(t) if t.index == 1));
        assert!(matches!(&records[2], ProtocolRecord::Error(e) if e.index == 2));
        match &records[3] {
            ProtocolRecord::Test(t) => {
                assert_eq!(t.index, 3);
                assert_eq!(t.event, RecordStatus::Failed);
                assert_eq!(t.message.as_deref(), Some("bad"));
                assert_eq!(t.stack.as_deref(), Some("Error: bad\n    at x"));
            }
            other => panic!("expected test record, found {other:?}"),
        }
    }
}
