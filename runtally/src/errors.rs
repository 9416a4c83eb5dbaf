// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::StderrStyles;
use owo_colors::OwoColorize;
use runtally_metadata::RuntallyExitCode;
use runtally_runner::errors::*;
use std::error::Error;
use thiserror::Error;
use tracing::error;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that runtally reports and then exits on.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine current directory")]
    CurrentDirFailed { error: std::io::Error },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 { path: std::path::PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("invalid format version")]
    FormatVersionError {
        #[from]
        err: FormatVersionError,
    },
    #[error("test run failed to complete")]
    RunnerError {
        #[from]
        err: RunnerError,
    },
}

impl ExpectedError {
    pub(crate) fn current_dir_failed(error: std::io::Error) -> Self {
        Self::CurrentDirFailed { error }
    }

    pub(crate) fn current_dir_invalid_utf8(path: std::path::PathBuf) -> Self {
        Self::CurrentDirInvalidUtf8 { path }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::FormatVersionError { .. }
            | Self::RunnerError { .. } => RuntallyExitCode::FATAL_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirFailed { error } => {
                error!("could not determine current directory");
                Some(error as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { path } => {
                error!(
                    "current directory `{}` is not valid UTF-8",
                    path.display().style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse runtally config at `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::FormatVersionError { err } => {
                error!("{err}");
                err.source()
            }
            Self::RunnerError { err } => display_runner_error(err, styles),
        };

        while let Some(err) = next_error {
            error!(target: "runtally::no_heading", "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

fn display_runner_error<'a>(err: &'a RunnerError, styles: &StderrStyles) -> Option<&'a dyn Error> {
    match err {
        RunnerError::Engine(EngineError::Discovery(DiscoveryError::NoTargets { patterns })) => {
            error!("couldn't find any files to test");
            error!(
                target: "runtally::no_heading",
                "(searched for: {})",
                patterns
                    .iter()
                    .map(|pattern| pattern.style(styles.bold).to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            None
        }
        RunnerError::Engine(EngineError::Discovery(DiscoveryError::InvalidGlob {
            pattern,
            error,
        })) => {
            error!("invalid glob pattern `{}`", pattern.style(styles.bold));
            Some(error as &dyn Error)
        }
        RunnerError::Engine(err) => {
            error!("test engine failed");
            Some(err as &dyn Error)
        }
        RunnerError::TallyMismatch { .. } => {
            // The message already contains both tallies.
            error!("{err}");
            None
        }
        other => {
            error!("{other}");
            other.source()
        }
    }
}
