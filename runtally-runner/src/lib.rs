// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core functionality for [runtally](https://crates.io/crates/runtally).
//!
//! runtally runs a set of test targets through an execution engine, aggregates the outcomes it
//! reports, and renders them either as a live status line followed by a human-readable report,
//! or as a line-oriented machine-readable stream.
//!
//! The main entry points are:
//!
//! * [`engine::TestEngine`], implemented by [`engine::ProcessEngine`];
//! * [`reporter::ReporterBuilder`], which builds the [`reporter::ResultAggregator`];
//! * [`runner::RunDriver`], which ties the two together.

pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod reporter;
pub mod runner;
mod time;
