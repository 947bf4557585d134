// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering of failed and errored results in a result tree.

use super::helpers::{DisplayWorker, Styles};
use crate::{
    helpers::DisplayQuoted,
    test_model::{ResultNode, TestGroup},
};
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Writes every failing or erroring leaf under `group`, in order.
///
/// Each issue is written as a header naming its enclosing group, then the issue's own rendering,
/// then a blank line. Passing leaves and groups without issues produce no output.
pub(super) fn write_test_errors(
    styles: &Styles,
    group: &TestGroup,
    worker: DisplayWorker,
    writer: &mut dyn Write,
) -> io::Result<()> {
    for child in &group.children {
        match child {
            ResultNode::Leaf(leaf) => {
                if let Some(rendering) = leaf.issue_rendering() {
                    writeln!(
                        writer,
                        "{} {}{worker}:",
                        "Error in testset".style(styles.fail),
                        DisplayQuoted(&group.description),
                    )?;
                    writer.write_all(rendering.as_bytes())?;
                    if !rendering.ends_with('\n') {
                        writeln!(writer)?;
                    }
                    writeln!(writer)?;
                }
            }
            ResultNode::Group(child) => write_test_errors(styles, child, worker, writer)?,
        }
    }
    Ok(())
}
