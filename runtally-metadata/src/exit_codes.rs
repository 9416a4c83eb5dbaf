// Copyright (c) The runtally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `runtally` runs.
///
/// A run either completes with every test passing, or it doesn't. Command-line usage errors are
/// reported by the argument parser and exit with code 2.
pub enum RuntallyExitCode {}

impl RuntallyExitCode {
    /// Every test passed and no unhandled errors were observed.
    pub const OK: i32 = 0;

    /// At least one test failed, or an unhandled rejection or uncaught exception was observed.
    pub const TEST_RUN_FAILED: i32 = 1;

    /// The run itself failed before it could be reported: the engine could not start, no test
    /// targets were found, or configuration could not be loaded.
    ///
    /// This shares its value with [`Self::TEST_RUN_FAILED`].
    pub const FATAL_ERROR: i32 = 1;
}
