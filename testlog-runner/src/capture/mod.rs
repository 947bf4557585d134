// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capturing the output of test runs into per-run log files.
//!
//! * [`LogPathResolver`] decides where the log file for a run lives.
//! * [`LogRedirector`] sends the ambient output of a unit of work to that file.
//! * [`CapturedLogStore`] reads the file back and cleans it up.

mod path;
mod redirect;
mod store;

pub use path::*;
pub use redirect::*;
pub use store::*;

use crate::test_model::{RunIndex, TestItem, TestSetup};

/// An entity that owns a log file.
#[derive(Clone, Copy, Debug)]
pub enum LogSource<'a> {
    /// A single run of a test item. Each run has its own log file.
    Item {
        /// The test item.
        item: &'a TestItem,

        /// The run of the test item.
        run: RunIndex,
    },

    /// A test setup. A test setup has a single log file for the lifetime of the process.
    Setup(&'a TestSetup),
}

impl<'a> LogSource<'a> {
    /// Creates a log source for a run of a test item.
    pub fn item(item: &'a TestItem, run: RunIndex) -> Self {
        Self::Item { item, run }
    }
}
