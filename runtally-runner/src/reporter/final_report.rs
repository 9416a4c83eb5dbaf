// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{AggregateSummary, StackSummarizer, helpers::Styles};
use crate::events::{ErrorInfo, ErrorLogEntry, UnhandledError};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use swrite::{SWrite, swriteln};

/// Writes the human-readable report shown after the status line is finished.
pub(super) fn write_final_report(
    summary: &AggregateSummary,
    summarizer: &StackSummarizer,
    styles: &Styles,
    writer: &mut dyn Write,
) -> io::Result<()> {
    let mut out = String::new();
    out.push('\n');

    let counts = [
        (summary.rejections, "rejection"),
        (summary.exceptions, "exception"),
    ];
    let mut wrote_count = false;
    for (count, noun) in counts {
        if count > 0 {
            swriteln!(
                out,
                "  {}",
                format_args!("{count} {}", plural(noun, count)).style(styles.fail)
            );
            wrote_count = true;
        }
    }
    if wrote_count {
        out.push('\n');
    }

    if summary.has_failures() {
        for (idx, entry) in summary.errors.iter().enumerate() {
            match entry {
                ErrorLogEntry::TestFailure(outcome) => {
                    swriteln!(
                        out,
                        "  {}",
                        format_args!("{}.{}", idx + 1, outcome.title).style(styles.title)
                    );
                    if let Some(error) = &outcome.error {
                        write_error_info(&mut out, error, summarizer, styles);
                    }
                }
                ErrorLogEntry::Unhandled(error) => {
                    swriteln!(out, "  {}", "Unhandled Error".style(styles.title));
                    write_payload(&mut out, error, styles);
                }
            }
            out.push('\n');
        }
    }

    writer.write_all(out.as_bytes())?;
    writer.flush()
}

fn write_error_info(
    out: &mut String,
    error: &ErrorInfo,
    summarizer: &StackSummarizer,
    styles: &Styles,
) {
    let stack = summarizer.summarize(&error.stack);
    let first_line = stack.lines().next().unwrap_or_default();
    if !error.message.is_empty() && !states_message(first_line, &error.message) {
        swriteln!(out, "  {}", error.message.style(styles.fail));
    }
    for line in stack.lines() {
        swriteln!(out, "  {line}");
    }
}

/// Returns true if `line` is `message` itself, or has the `<ErrorName>: <message>` shape.
fn states_message(line: &str, message: &str) -> bool {
    line == message
        || line
            .strip_suffix(message)
            .is_some_and(|prefix| prefix.ends_with(": "))
}

fn write_payload(out: &mut String, error: &UnhandledError, styles: &Styles) {
    let payload = serde_json::to_string_pretty(&error.payload)
        .unwrap_or_else(|_| error.payload.to_string());
    for line in payload.lines() {
        swriteln!(out, "  {}", line.style(styles.fail));
    }
}

fn plural(noun: &str, count: usize) -> String {
    if count == 1 {
        noun.to_owned()
    } else {
        format!("{noun}s")
    }
}
