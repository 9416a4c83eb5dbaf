// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trimming stack traces down to the frames a user cares about.

use regex::Regex;
use std::sync::LazyLock;

/// Continuation lines of the form `    at <frame>`.
static FRAME_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {4}at\b").expect("regex is valid"));

/// File-location frames of the form `(<absolute path>:<line>:<col>)`, optionally with a Windows
/// drive prefix. Capture group 1 is the path, including the drive prefix.
static FILE_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(((?:[A-Za-z]:)?(?:[\\/][^:\\/]+)+):\d+:\d+\)").expect("regex is valid")
});

/// Trims raw stack traces to their user-relevant frames.
///
/// A line is *relevant* if either:
///
/// * it is at least six characters long and is not an `    at` frame line (typically the error
///   message, or output that isn't a stack frame), or
/// * it contains a file-location frame whose path does not lie within one of the framework
///   installation directories.
///
/// Everything above the first relevant line is framework noise and is dropped. The first relevant
/// line and everything after it are kept verbatim.
#[derive(Clone, Debug, Default)]
pub struct StackSummarizer {
    // Normalized to forward slashes, with a trailing slash.
    framework_dirs: Vec<String>,
}

impl StackSummarizer {
    /// Creates a new summarizer which treats frames within `framework_dirs` as internal.
    pub fn new<I, S>(framework_dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let framework_dirs = framework_dirs
            .into_iter()
            .filter_map(|dir| {
                let dir = dir.as_ref().replace('\\', "/");
                let dir = dir.trim_end_matches('/');
                (!dir.is_empty()).then(|| format!("{dir}/"))
            })
            .collect();
        Self { framework_dirs }
    }

    /// Summarizes a raw stack trace.
    ///
    /// Returns an empty string if no line is relevant.
    pub fn summarize(&self, raw: &str) -> String {
        let mut found = false;
        let kept: Vec<&str> = raw
            .split('\n')
            .filter(|line| {
                found = found || self.is_relevant(line);
                found
            })
            .collect();
        kept.join("\n")
    }

    fn is_relevant(&self, line: &str) -> bool {
        let is_text_line = line.chars().nth(5).is_some() && !FRAME_LINE.is_match(line);
        is_text_line
            || FILE_LOCATION
                .captures_iter(line)
                .any(|captures| !self.is_framework_path(&captures[1]))
    }

    fn is_framework_path(&self, path: &str) -> bool {
        let path = path.replace('\\', "/");
        self.framework_dirs.iter().any(|dir| path.contains(dir))
    }
}
