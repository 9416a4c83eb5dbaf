// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builder for the result aggregator and its outputs.

use super::{
    RenderMode, ResultAggregator, ShowStatus, StackSummarizer,
    aggregator::ReportOutput,
    helpers::Styles,
    protocol::{FormatVersion, ProtocolEmitter},
    status::{HiddenStatus, LineStatus, LiveStatus, StatusLine, StatusSink},
};
use debug_ignore::DebugIgnore;
use std::io::{self, IsTerminal, Write};
use tracing::debug;

/// Standard error destination for the reporter.
///
/// This is usually a terminal, but can be an in-memory buffer for tests.
pub enum ReporterStderr<'a> {
    /// Produce output on the (possibly piped) terminal.
    ///
    /// If the terminal isn't piped, the status line is redrawn in place.
    Terminal,

    /// Write output to a buffer.
    Buffer(&'a mut Vec<u8>),
}

/// Standard output destination for the reporter.
///
/// Protocol records are written here.
pub enum ReporterStdout<'a> {
    /// Produce output on standard output.
    Terminal,

    /// Write output to a buffer.
    Buffer(&'a mut Vec<u8>),
}

/// Test reporter builder.
#[derive(Debug, Default)]
pub struct ReporterBuilder {
    render_mode: RenderMode,
    show_status: ShowStatus,
    should_colorize: bool,
    format_version: FormatVersion,
    framework_dirs: Vec<String>,
}

impl ReporterBuilder {
    /// Sets the render mode.
    pub fn set_render_mode(&mut self, render_mode: RenderMode) -> &mut Self {
        self.render_mode = render_mode;
        self
    }

    /// Sets how the status line is shown in interactive mode.
    pub fn set_show_status(&mut self, show_status: ShowStatus) -> &mut Self {
        self.show_status = show_status;
        self
    }

    /// Set to true if the reporter should colorize output.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Sets the version of the protocol format.
    pub fn set_format_version(&mut self, format_version: FormatVersion) -> &mut Self {
        self.format_version = format_version;
        self
    }

    /// Sets the directories whose stack frames are hidden in failure reports.
    pub fn set_framework_dirs<I, S>(&mut self, framework_dirs: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.framework_dirs = framework_dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Creates a new result aggregator writing to the given outputs.
    pub fn build<'a>(
        &self,
        stdout: ReporterStdout<'a>,
        stderr: ReporterStderr<'a>,
    ) -> ResultAggregator<'a> {
        let mut styles = Box::<Styles>::default();
        if self.should_colorize {
            styles.colorize();
        }
        let summarizer = StackSummarizer::new(&self.framework_dirs);

        let output = match self.render_mode {
            RenderMode::Interactive => {
                let sink = self.status_sink(&stderr);
                let writer: Box<dyn Write + 'a> = match stderr {
                    ReporterStderr::Terminal => Box::new(io::stderr()),
                    ReporterStderr::Buffer(buf) => Box::new(buf),
                };
                ReportOutput::Interactive {
                    status: StatusLine::new(sink),
                    writer: DebugIgnore(writer),
                }
            }
            RenderMode::Protocol => {
                let writer: Box<dyn Write + 'a> = match stdout {
                    ReporterStdout::Terminal => Box::new(io::stdout()),
                    ReporterStdout::Buffer(buf) => Box::new(buf),
                };
                ReportOutput::Protocol(ProtocolEmitter::new(self.format_version, writer))
            }
        };

        ResultAggregator::new(output, summarizer, styles)
    }

    fn status_sink(&self, stderr: &ReporterStderr<'_>) -> Box<dyn StatusSink> {
        match (self.show_status, stderr) {
            (ShowStatus::None, _) => Box::new(HiddenStatus::default()),
            (ShowStatus::Lines, _) | (_, ReporterStderr::Buffer(_)) => {
                Box::new(LineStatus::default())
            }
            (ShowStatus::Auto, ReporterStderr::Terminal) if is_ci::uncached() => {
                // Some CI environments appear to pretend to be a terminal.
                debug!("CI detected, printing status line by line");
                Box::new(LineStatus::default())
            }
            (ShowStatus::Auto | ShowStatus::Live, ReporterStderr::Terminal) => {
                if io::stderr().is_terminal() {
                    Box::new(LiveStatus::new())
                } else {
                    debug!("stderr is not a terminal, printing status line by line");
                    Box::new(LineStatus::default())
                }
            }
        }
    }
}
