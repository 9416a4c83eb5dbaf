// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The live status line shown while tests run in human mode.

use super::helpers::Styles;
use debug_ignore::DebugIgnore;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::OwoColorize;
use serde::Deserialize;
use std::io::{self, Write};
use swrite::{SWrite, swrite};

/// How to show the status line in human mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShowStatus {
    /// Redraw the status line in place if stderr is an interactive terminal and runtally isn't
    /// running in CI, otherwise print one line per update.
    #[default]
    Auto,

    /// Redraw the status line in place. Falls back to one line per update if stderr isn't a
    /// terminal.
    Live,

    /// Print one line per update.
    Lines,

    /// Don't show a status line.
    None,
}

/// Renders the status line for the given counters.
///
/// Each non-zero counter contributes one segment. A line with both counters at zero is empty.
pub(super) fn render_status(passed: usize, failed: usize, styles: &Styles) -> String {
    let mut line = String::new();
    if passed > 0 {
        swrite!(line, "  {}", format_args!("{passed} passed").style(styles.pass));
    }
    if failed > 0 {
        swrite!(line, "  {}", format_args!("{failed} failed").style(styles.fail));
    }
    line
}

/// A destination for status lines.
///
/// `writer` is the stream the status line shares with the rest of the human report.
/// Implementations that draw to the terminal directly may ignore it.
pub trait StatusSink {
    /// Replaces the previously committed line with `line`.
    fn commit(&mut self, line: &str, writer: &mut dyn Write) -> io::Result<()>;

    /// Called once at the end of the run. The last committed line stays visible.
    fn finish(&mut self, writer: &mut dyn Write) -> io::Result<()>;

    /// Called instead of `finish` if the run is aborted by a fatal error.
    fn abandon(&mut self, writer: &mut dyn Write) -> io::Result<()> {
        self.finish(writer)
    }
}

/// Redraws the status line in place on stderr.
#[derive(Debug)]
pub struct LiveStatus {
    bar: ProgressBar,
}

impl LiveStatus {
    /// Creates a new live status line drawing to stderr.
    pub fn new() -> Self {
        // The refresh rate is limited to 20hz so that bursts of events don't flood the terminal.
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(20));
        bar.set_style(
            ProgressStyle::with_template("{msg}").expect("template is known to be valid"),
        );
        Self { bar }
    }
}

impl Default for LiveStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for LiveStatus {
    fn commit(&mut self, line: &str, _writer: &mut dyn Write) -> io::Result<()> {
        self.bar.set_message(line.to_owned());
        Ok(())
    }

    fn finish(&mut self, _writer: &mut dyn Write) -> io::Result<()> {
        self.bar.finish();
        Ok(())
    }

    fn abandon(&mut self, _writer: &mut dyn Write) -> io::Result<()> {
        self.bar.finish_and_clear();
        Ok(())
    }
}

/// Prints each status line on its own line.
///
/// Used when the output isn't an interactive terminal.
#[derive(Debug, Default)]
pub struct LineStatus {
    _private: (),
}

impl StatusSink for LineStatus {
    fn commit(&mut self, line: &str, writer: &mut dyn Write) -> io::Result<()> {
        writeln!(writer, "{line}")
    }

    fn finish(&mut self, writer: &mut dyn Write) -> io::Result<()> {
        writer.flush()
    }
}

/// Discards status lines.
#[derive(Debug, Default)]
pub struct HiddenStatus {
    _private: (),
}

impl StatusSink for HiddenStatus {
    fn commit(&mut self, _line: &str, _writer: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }

    fn finish(&mut self, _writer: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}

/// Tracks the status sink along with the last line committed to it.
#[derive(Debug)]
pub(super) struct StatusLine {
    sink: DebugIgnore<Box<dyn StatusSink>>,
    last: Option<String>,
}

impl StatusLine {
    pub(super) fn new(sink: Box<dyn StatusSink>) -> Self {
        Self {
            sink: DebugIgnore(sink),
            last: None,
        }
    }

    pub(super) fn update(
        &mut self,
        passed: usize,
        failed: usize,
        styles: &Styles,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        let line = render_status(passed, failed, styles);
        if self.last.as_deref() == Some(line.as_str()) {
            return Ok(());
        }
        self.sink.commit(&line, writer)?;
        self.last = Some(line);
        Ok(())
    }

    pub(super) fn finish(&mut self, writer: &mut dyn Write) -> io::Result<()> {
        self.sink.finish(writer)
    }

    pub(super) fn abandon(&mut self, writer: &mut dyn Write) -> io::Result<()> {
        self.sink.abandon(writer)
    }
}
