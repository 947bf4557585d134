// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queries, read-back and cleanup of captured log files.

use super::{LogPathResolver, LogSource};
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    fs::{self, File},
    io::{self, Write},
};
use tracing::{debug, warn};

/// Access to the log files captured for test item runs and test setups.
///
/// A log file that doesn't exist and an empty log file are treated identically: both mean "no
/// logs". A file that disappears between a query and a read is also treated as "no logs".
#[derive(Clone, Debug)]
pub struct CapturedLogStore {
    resolver: LogPathResolver,
}

impl CapturedLogStore {
    /// Creates a store for log files resolved by `resolver`.
    pub fn new(resolver: LogPathResolver) -> Self {
        Self { resolver }
    }

    /// Returns the path resolver used by this store.
    pub fn resolver(&self) -> &LogPathResolver {
        &self.resolver
    }

    /// Returns the path of the log file for `source`, whether or not it exists.
    pub fn log_path(&self, source: LogSource<'_>) -> Utf8PathBuf {
        self.resolver.log_path(source)
    }

    /// Returns true if the log file for `source` exists and is non-empty.
    pub fn has_logs(&self, source: LogSource<'_>) -> bool {
        path_has_logs(&self.log_path(source))
    }

    /// Returns the path of the log file for `source` if it exists and is non-empty.
    ///
    /// Log files of failed runs are kept after reporting, so this is how a structured report
    /// generator finds the logs to attach.
    pub fn surviving_log(&self, source: LogSource<'_>) -> Option<Utf8PathBuf> {
        let path = self.log_path(source);
        path_has_logs(&path).then_some(path)
    }

    /// Copies the raw contents of the log file for `source` into `sink`.
    ///
    /// Returns `Ok(true)` if any bytes were copied and `Ok(false)` if there were no logs,
    /// including when the file doesn't exist.
    pub fn read_into(&self, source: LogSource<'_>, sink: &mut dyn Write) -> io::Result<bool> {
        read_path_into(&self.log_path(source), sink)
    }

    /// Deletes the log file for `source`.
    ///
    /// This is best-effort: a missing file is not an error, and other failures are logged and
    /// otherwise ignored.
    pub fn cleanup(&self, source: LogSource<'_>) {
        remove_path(&self.log_path(source));
    }
}

fn path_has_logs(path: &Utf8Path) -> bool {
    fs::metadata(path).is_ok_and(|metadata| metadata.len() > 0)
}

fn read_path_into(path: &Utf8Path, sink: &mut dyn Write) -> io::Result<bool> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(error) => return Err(error),
    };
    let copied = io::copy(&mut file, sink)?;
    Ok(copied > 0)
}

fn remove_path(path: &Utf8Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("removed log file `{path}`"),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => warn!("failed to remove log file `{path}`: {error}"),
    }
}
