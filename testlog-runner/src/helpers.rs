// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for testlog-runner.

use std::fmt;

/// Utilities for pluralizing various words based on count or plurality.
pub(crate) mod plural {
    /// Returns "allocation" if `count` is 1, otherwise "allocations".
    pub(crate) fn allocations_str(count: u64) -> &'static str {
        if count == 1 {
            "allocation"
        } else {
            "allocations"
        }
    }

    /// Returns "byte" if `count` is 1, otherwise "bytes".
    pub(crate) fn bytes_str(count: u64) -> &'static str {
        if count == 1 { "byte" } else { "bytes" }
    }
}

/// Counter index display for test items: `( 3/12)`.
pub(crate) struct DisplayCounterIndex {
    current: usize,
    total: usize,
}

impl DisplayCounterIndex {
    pub(crate) fn new(current: usize, total: usize) -> Self {
        Self { current, total }
    }
}

impl fmt::Display for DisplayCounterIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:>width$}/{})",
            self.current,
            self.total,
            width = usize_decimal_char_width(self.total)
        )
    }
}

pub(crate) fn usize_decimal_char_width(n: usize) -> usize {
    // checked_ilog10 returns 0 for 1-9, 1 for 10-99, 2 for 100-999, etc. (And
    // None for 0 which we unwrap to the same as 1). Add 1 to it to get the
    // actual number of digits.
    (n.checked_ilog10().unwrap_or(0) + 1) as usize
}

/// Displays a name surrounded by double quotes, with special characters escaped.
pub(crate) struct DisplayQuoted<'a>(pub(crate) &'a str);

impl fmt::Display for DisplayQuoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
