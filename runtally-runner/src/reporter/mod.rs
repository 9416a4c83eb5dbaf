// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporting of test results.
//!
//! The [`ResultAggregator`] consumes lifecycle events for a run. In interactive mode it keeps a
//! status line up to date and writes a final report to stderr; in protocol mode it writes one
//! machine-readable record per event to stdout.

mod aggregator;
mod final_report;
mod helpers;
mod imp;
mod protocol;
mod stack;
mod status;

pub use aggregator::*;
pub use imp::*;
pub use protocol::FormatVersion;
pub use stack::StackSummarizer;
pub use status::{HiddenStatus, LineStatus, LiveStatus, ShowStatus, StatusSink};
