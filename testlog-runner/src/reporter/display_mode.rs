// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Display modes: when captured logs are surfaced in reports.

use crate::errors::DisplayModeParseError;
use serde::Deserialize;
use std::{fmt, str::FromStr};

/// Controls when captured logs, as opposed to errors, are included in a report.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    /// Logs are printed live while the run executes, so reports never repeat them.
    Eager,

    /// Logs are only printed for runs that failed or errored.
    #[default]
    Issues,

    /// Logs are printed after every run, whether or not it failed.
    Batched,
}

impl DisplayMode {
    /// Returns the string representations of all known variants.
    pub fn variants() -> &'static [&'static str] {
        &["eager", "issues", "batched"]
    }

    /// Returns the default display mode for a test run.
    ///
    /// * If a structured report is being generated, every run's logs are useful: `batched`.
    /// * An interactive run without workers can show logs as they happen: `eager`.
    /// * Otherwise, only logs for runs with issues are shown: `issues`.
    pub fn default_for(report: bool, num_workers: usize, interactive: bool) -> Self {
        if report {
            Self::Batched
        } else if interactive && num_workers == 0 {
            Self::Eager
        } else {
            Self::Issues
        }
    }

    /// Returns true if a report should be composed for a run in this mode.
    pub(crate) fn should_compose(self, has_errors: bool) -> bool {
        has_errors || self == Self::Batched
    }

    /// Returns true if captured logs belong in reports composed in this mode.
    pub(crate) fn reports_logs(self) -> bool {
        self != Self::Eager
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eager => write!(f, "eager"),
            Self::Issues => write!(f, "issues"),
            Self::Batched => write!(f, "batched"),
        }
    }
}

impl FromStr for DisplayMode {
    type Err = DisplayModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eager" => Ok(Self::Eager),
            "issues" => Ok(Self::Issues),
            "batched" => Ok(Self::Batched),
            other => Err(DisplayModeParseError::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;
    use test_strategy::proptest;

    #[test]
    fn display_mode_variants() {
        for &variant in DisplayMode::variants() {
            variant.parse::<DisplayMode>().expect("variant is valid");
        }
    }

    #[proptest]
    fn display_mode_from_str_display_roundtrip(mode: DisplayMode) {
        let displayed = mode.to_string();
        let mode2 = displayed.parse::<DisplayMode>().expect("Display output is valid");
        prop_assert_eq!(mode, mode2, "Display -> FromStr roundtrips");
    }

    #[test_case(true, 0, true, DisplayMode::Batched; "report wins over interactive")]
    #[test_case(true, 4, false, DisplayMode::Batched; "report with workers")]
    #[test_case(false, 0, true, DisplayMode::Eager; "interactive without workers")]
    #[test_case(false, 2, true, DisplayMode::Issues; "interactive with workers")]
    #[test_case(false, 0, false, DisplayMode::Issues; "non-interactive")]
    fn default_for(report: bool, num_workers: usize, interactive: bool, expected: DisplayMode) {
        assert_eq!(
            DisplayMode::default_for(report, num_workers, interactive),
            expected
        );
    }

    #[test]
    fn compose_policy() {
        assert!(!DisplayMode::Issues.should_compose(false));
        assert!(!DisplayMode::Eager.should_compose(false));
        assert!(DisplayMode::Batched.should_compose(false));
        for mode in [DisplayMode::Eager, DisplayMode::Issues, DisplayMode::Batched] {
            assert!(mode.should_compose(true), "{mode} composes on errors");
        }
        assert!(!DisplayMode::Eager.reports_logs());
    }
}
