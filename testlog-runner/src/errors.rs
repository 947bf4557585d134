// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by testlog.

use crate::reporter::DisplayMode;
use camino::Utf8PathBuf;
use config::ConfigError;
use thiserror::Error;

/// An error that occurred while loading the capture configuration.
#[derive(Debug, Error)]
#[error("failed to parse testlog config{}", .config_file.as_ref().map(|f| format!(" at `{f}`")).unwrap_or_default())]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Option<Utf8PathBuf>,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: Option<Utf8PathBuf>, err: ConfigError) -> Self {
        Self { config_file, err }
    }

    /// Returns the config file that failed to parse, if the error came from a file.
    pub fn config_file(&self) -> Option<&Utf8PathBuf> {
        self.config_file.as_ref()
    }
}

/// Error returned while parsing a [`DisplayMode`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for display mode: {input}\n(known values: {})",
    DisplayMode::variants().join(", "),
)]
pub struct DisplayModeParseError {
    input: String,
}

impl DisplayModeParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurred while redirecting ambient output.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RedirectError {
    /// The log file could not be opened for writing.
    #[error("failed to open log file `{path}` for writing")]
    Open {
        /// The path that failed to open.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// Output is already being redirected to a different target in this execution context.
    #[error("output is already redirected to {active}, cannot redirect to {requested}")]
    AlreadyRedirected {
        /// A description of the target that is currently active.
        active: String,

        /// A description of the target that was requested.
        requested: String,
    },
}

/// An error that occurred while composing or writing a report for a single test item.
///
/// A report error only affects the report for that item: callers are expected to log it and
/// carry on with the rest of the run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    /// The captured log file could not be read.
    #[error("failed to read captured logs from `{path}`")]
    ReadLogs {
        /// The log file that failed to be read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The composed report could not be written to the shared output.
    #[error("failed to write report for test item `{name}`")]
    Write {
        /// The name of the test item.
        name: String,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The requested run does not exist for this test item.
    #[error("test item `{name}` has no recorded run {run} (runs recorded: {recorded})")]
    UnknownRun {
        /// The name of the test item.
        name: String,

        /// The run that was requested.
        run: u32,

        /// The number of runs that have been recorded.
        recorded: usize,
    },
}
