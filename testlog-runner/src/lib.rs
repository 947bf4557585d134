// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Output capture and failure reports for concurrent test runners.
//!
//! The basic flow is:
//!
//! 1. Create an [`OutputContext`](output::OutputContext) once, before any output is redirected.
//!    It owns the shared output stream and the lock that serializes writes to it.
//! 2. For each run of a test item, resolve a log path with
//!    [`LogPathResolver`](capture::LogPathResolver) and run the test body under
//!    [`LogRedirector::redirect`](capture::LogRedirector::redirect).
//! 3. Once the run is done, hand the item to the [`ReportPrinter`](reporter::ReportPrinter),
//!    which reads the captured logs back, renders errors, writes the report in one locked
//!    operation and cleans up log files for passing runs.

pub mod capture;
pub mod config;
pub mod errors;
mod helpers;
pub mod output;
pub mod reporter;
pub mod test_model;
