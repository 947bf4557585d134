// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Detection of test sets that contain no tests.

use crate::{
    helpers::DisplayQuoted,
    test_model::{ResultNode, TestGroup, TestItem},
};
use std::fmt;
use tracing::warn;

/// Returns the descriptions of all empty groups in `root`, in pre-order.
///
/// A group is empty if it has no children and nothing passed in it. A group that only contains
/// empty groups isn't itself empty, but the groups inside it are reported.
pub fn find_empty_testsets(root: &TestGroup) -> Vec<&str> {
    let mut empty = Vec::new();
    find_empty_impl(root, &mut empty);
    empty
}

fn find_empty_impl<'a>(group: &'a TestGroup, empty: &mut Vec<&'a str>) {
    if group.children.is_empty() && group.n_passed == 0 {
        empty.push(&group.description);
        return;
    }
    for child in &group.children {
        if let ResultNode::Group(child) = child {
            find_empty_impl(child, empty);
        }
    }
}

/// A warning about test sets without tests in a test item.
#[derive(Clone, Debug)]
pub struct EmptyTestsetsWarning<'a> {
    item: &'a TestItem,
    descriptions: Vec<&'a str>,
}

impl<'a> EmptyTestsetsWarning<'a> {
    /// Scans `results` for empty test sets, returning a warning if any were found.
    pub fn new(item: &'a TestItem, results: &'a TestGroup) -> Option<Self> {
        let descriptions = find_empty_testsets(results);
        (!descriptions.is_empty()).then_some(Self { item, descriptions })
    }

    /// The descriptions of the empty test sets, in the order they were found.
    pub fn descriptions(&self) -> &[&'a str] {
        &self.descriptions
    }
}

impl fmt::Display for EmptyTestsetsWarning<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "test item {} at {} contains test sets without tests:",
            DisplayQuoted(&self.item.name),
            self.item.location,
        )?;
        for description in &self.descriptions {
            write!(f, "\n{description}")?;
        }
        Ok(())
    }
}

/// Emits a warning through `tracing` if the given run of `item` contains empty test sets.
///
/// Returns true if a warning was emitted.
pub fn warn_empty_testsets(item: &TestItem, results: &TestGroup) -> bool {
    match EmptyTestsetsWarning::new(item, results) {
        Some(warning) => {
            warn!("{warning}");
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_model::{LeafResult, SourceLocation, TestItemId};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_empty_children_in_order() {
        let root = TestGroup::new("root")
            .with_child(TestGroup::new("empty 1"))
            .with_child(TestGroup::new("not empty").with_passed(3))
            .with_child(TestGroup::new("empty 2"));
        assert_eq!(find_empty_testsets(&root), ["empty 1", "empty 2"]);
    }

    #[test]
    fn root_itself_can_be_empty() {
        assert_eq!(find_empty_testsets(&TestGroup::new("root")), ["root"]);
    }

    #[test]
    fn group_of_empty_groups_is_not_flagged() {
        let root = TestGroup::new("root").with_passed(1).with_child(
            TestGroup::new("only empties")
                .with_child(TestGroup::new("inner a"))
                .with_child(TestGroup::new("inner b").with_child(TestGroup::new("deepest"))),
        );
        assert_eq!(find_empty_testsets(&root), ["inner a", "deepest"]);
    }

    #[test]
    fn leaves_make_a_group_non_empty() {
        let root = TestGroup::new("root")
            .with_child(TestGroup::new("failing").with_child(LeafResult::fail("nope")));
        assert!(find_empty_testsets(&root).is_empty());
    }

    #[test]
    fn warning_display() {
        let item = TestItem::new(
            TestItemId::new("1"),
            "my item",
            SourceLocation::new("/proj/test/x_tests.rs", 5, "/proj"),
        );
        let root = TestGroup::new("my item")
            .with_child(TestGroup::new("a"))
            .with_child(TestGroup::new("b"));

        let warning = EmptyTestsetsWarning::new(&item, &root).expect("empty test sets found");
        assert_eq!(
            warning.to_string(),
            indoc! {r#"
                test item "my item" at test/x_tests.rs:5 contains test sets without tests:
                a
                b"#}
        );

        let full = TestGroup::new("my item").with_passed(1);
        assert!(EmptyTestsetsWarning::new(&item, &full).is_none());
        assert!(!warn_empty_testsets(&item, &full));
        assert!(warn_empty_testsets(&item, &root));
    }
}
