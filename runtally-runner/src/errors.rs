// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by runtally.

use crate::engine::EngineTally;
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error, fmt};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse runtally config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }
}

/// An error that occurs while parsing the requested version of the machine-readable format.
#[derive(Clone, Debug, Error)]
#[error("invalid message format version `{input}`")]
pub struct FormatVersionError {
    /// The input that failed to parse.
    pub input: String,
    /// The underlying error.
    #[source]
    pub err: FormatVersionErrorInner,
}

/// The different errors that can occur when parsing and validating a format version.
#[derive(Clone, Debug, Error)]
pub enum FormatVersionErrorInner {
    /// The input did not have a valid syntax.
    #[error("expected format version in form of `{expected}`")]
    InvalidFormat {
        /// The expected pseudo format.
        expected: &'static str,
    },
    /// A decimal integer was expected but could not be parsed.
    #[error("version component `{which}` could not be parsed as an integer")]
    InvalidInteger {
        /// Which component was invalid.
        which: &'static str,
        /// The parse failure.
        #[source]
        err: std::num::ParseIntError,
    },
    /// The version component was not within the expected range.
    #[error("version component `{which}` value {value} is out of range {range:?}")]
    InvalidValue {
        /// The component which was out of range.
        which: &'static str,
        /// The value that was parsed.
        value: u8,
        /// The range of valid values for the component.
        range: std::ops::Range<u8>,
    },
}

/// An error that occurs while writing an event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing the event to the provided output.
    #[error("error writing to output")]
    Io(#[source] std::io::Error),
}

/// An error that occurs while discovering test targets.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// A pattern could not be parsed as a glob.
    #[error("invalid glob pattern `{pattern}`")]
    InvalidGlob {
        /// The pattern.
        pattern: String,

        /// The underlying error.
        #[source]
        error: globset::Error,
    },

    /// An error occurred while traversing the working directory.
    #[error("error reading directory while looking for test files")]
    Walk(#[source] walkdir::Error),

    /// No test targets matched.
    #[error("couldn't find any files to test")]
    NoTargets {
        /// The patterns that were searched for.
        patterns: Vec<String>,
    },
}

/// An error that causes an execution engine's run to fail.
///
/// This is a fatal error: normal reporting is skipped.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Test targets could not be discovered.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The list of preload modules could not be passed to test targets.
    #[error("preload module `{module}` cannot be passed through the environment")]
    InvalidRequire {
        /// The module that could not be passed.
        module: String,

        /// The underlying error.
        #[source]
        error: std::env::JoinPathsError,
    },

    /// The engine failed for some other reason.
    #[error("{message}")]
    Bootstrap {
        /// A description of the failure.
        message: String,
    },
}

impl EngineError {
    /// Creates a new bootstrap error with the given message.
    pub fn bootstrap(message: impl Into<String>) -> Self {
        Self::Bootstrap {
            message: message.into(),
        }
    }
}

/// A fatal error that aborts a test run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    /// The async runtime used to drive the run could not be created.
    #[error("error creating async runtime")]
    RuntimeCreate(#[source] std::io::Error),

    /// The execution engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A report could not be written.
    #[error("error writing test report")]
    WriteEvent(#[from] WriteEventError),

    /// The engine's tally disagrees with the events it delivered.
    #[error(
        "engine reported a tally of ({engine}), but the events it delivered add up to ({observed})"
    )]
    TallyMismatch {
        /// The tally reported by the engine.
        engine: EngineTally,

        /// The tally computed from delivered events.
        observed: EngineTally,
    },
}

/// Displays an error along with its chain of sources, one per line.
pub struct DisplayErrorChain<E>(E);

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self(error)
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut next = self.0.source();
        while let Some(err) = next {
            write!(f, "\n  caused by: {err}")?;
            next = err.source();
        }
        Ok(())
    }
}
