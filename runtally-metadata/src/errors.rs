// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{error, fmt};

/// An error that occurs while parsing a stream of protocol records.
#[derive(Debug)]
pub struct RecordParseError {
    line_number: usize,
    error: serde_json::Error,
}

impl RecordParseError {
    pub(crate) fn new(line_number: usize, error: serde_json::Error) -> Self {
        Self { line_number, error }
    }

    /// Returns the 1-based line number at which parsing failed.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl fmt::Display for RecordParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "error parsing protocol record at line {}", self.line_number)
    }
}

impl error::Error for RecordParseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.error)
    }
}
