// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic log file locations.

use super::LogSource;
use crate::test_model::{RunIndex, SourceLocation, TestItem, TestSetup};
use camino::{Utf8Path, Utf8PathBuf};
use xxhash_rust::xxh3::{Xxh3, xxh3_64};

/// The default number of characters of a sanitized display name kept in a log file name.
pub const DEFAULT_MAX_NAME_LEN: usize = 150;

/// The suffix of every log file.
pub const LOG_FILE_SUFFIX: &str = ".log";

/// Resolves the log file for a test item run or a test setup.
///
/// File names have the form `<name>_<hash>_<run>.log` for test items and `<name>_<hash>.log` for
/// test setups, where `<name>` is the sanitized, truncated display name and `<hash>` is 16 hex
/// digits of the xxh3 hash of the raw item identifier (or of the setup's source location). The
/// hash keeps file names unique even when two display names, or two identifiers, sanitize to the
/// same string.
///
/// All files live directly under a single directory, provided by the caller.
#[derive(Clone, Debug)]
pub struct LogPathResolver {
    dir: Utf8PathBuf,
    max_name_len: usize,
}

impl LogPathResolver {
    /// Creates a resolver placing log files under `dir`.
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_name_len: DEFAULT_MAX_NAME_LEN,
        }
    }

    /// Sets the number of characters of a sanitized display name kept in file names.
    pub fn with_max_name_len(mut self, max_name_len: usize) -> Self {
        self.max_name_len = max_name_len;
        self
    }

    /// The directory log files are placed in.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Returns the log file path for a log source.
    pub fn log_path(&self, source: LogSource<'_>) -> Utf8PathBuf {
        match source {
            LogSource::Item { item, run } => self.item_log_path(item, run),
            LogSource::Setup(setup) => self.setup_log_path(setup),
        }
    }

    /// Returns the log file path for the given run of a test item.
    pub fn item_log_path(&self, item: &TestItem, run: RunIndex) -> Utf8PathBuf {
        self.dir.join(self.item_file_name(item, run))
    }

    /// Returns the log file path for a test setup.
    pub fn setup_log_path(&self, setup: &TestSetup) -> Utf8PathBuf {
        self.dir.join(self.setup_file_name(setup))
    }

    fn item_file_name(&self, item: &TestItem, run: RunIndex) -> String {
        // The hash is fixed-width and the run index has no `_`, so the last two fields always
        // parse back unambiguously even if the sanitized name contains `_`.
        format!(
            "{}_{:016x}_{}{LOG_FILE_SUFFIX}",
            sanitize_name(&item.name, self.max_name_len),
            xxh3_64(item.id.as_str().as_bytes()),
            run,
        )
    }

    fn setup_file_name(&self, setup: &TestSetup) -> String {
        format!(
            "{}_{:016x}{LOG_FILE_SUFFIX}",
            sanitize_name(&setup.name, self.max_name_len),
            location_hash(&setup.location),
        )
    }
}

/// Replaces every character outside `[A-Za-z0-9_-]` with `_`, keeping at most `max_len`
/// characters.
pub(crate) fn sanitize_name(name: &str, max_len: usize) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect()
}

fn location_hash(location: &SourceLocation) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.update(location.file.as_str().as_bytes());
    hasher.update(&location.line.to_le_bytes());
    hasher.digest()
}
