// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the machine-readable output of runtally.
//!
//! runtally writes a stream of newline-delimited JSON records to standard output when run with
//! `--message-format json`. This crate contains the serde types for those records, along with the
//! documented exit codes of the `runtally` binary.

mod errors;
mod exit_codes;
mod records;

pub use errors::*;
pub use exit_codes::*;
pub use records::*;
