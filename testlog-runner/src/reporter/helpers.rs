// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::test_model::WorkerId;
use owo_colors::Style;
use std::fmt;

#[derive(Debug, Default, Clone)]
pub(super) struct Styles {
    pub(super) is_colorized: bool,
    pub(super) header: Style,
    pub(super) location: Style,
    pub(super) state: Style,
    pub(super) fail: Style,
    pub(super) warn: Style,
}

impl Styles {
    pub(super) fn new(is_colorized: bool) -> Self {
        let mut styles = Self::default();
        if is_colorized {
            styles.colorize();
        }
        styles
    }

    pub(super) fn colorize(&mut self) {
        self.is_colorized = true;
        self.header = Style::new().bold();
        self.location = Style::new().bold();
        self.state = Style::new().bold();
        self.fail = Style::new().red().bold();
        self.warn = Style::new().yellow().bold();
    }
}

/// The ` on worker <id>` suffix attributing output to the context that produced it.
#[derive(Clone, Copy, Debug)]
pub(super) enum DisplayWorker {
    /// Output produced by this process.
    Local,

    /// Output produced by a test item, on its assigned worker if it has one.
    Assigned(Option<WorkerId>),
}

impl fmt::Display for DisplayWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, " on worker {}", std::process::id()),
            Self::Assigned(Some(worker)) => write!(f, " on worker {worker}"),
            Self::Assigned(None) => Ok(()),
        }
    }
}
