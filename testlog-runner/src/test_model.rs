// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test model consumed by the capture and report pipeline.
//!
//! Test items, fixtures and result trees are built by the scheduler that drives a test run. This
//! crate only reads them: the types here are the minimal surface the capture and report steps
//! need.

use camino::{Utf8Path, Utf8PathBuf};
use smol_str::SmolStr;
use std::{fmt, num::NonZeroU32, sync::Arc};

/// A unique identifier for a test item.
///
/// Two test items may share a display name, but never an identifier.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TestItemId(SmolStr);

impl TestItemId {
    /// Creates a new identifier.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id))
    }

    /// Returns the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identifier of a worker that executed a test item.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 1-based index identifying one execution attempt of a test item.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RunIndex(NonZeroU32);

impl RunIndex {
    /// The first run of a test item.
    pub const FIRST: Self = Self(NonZeroU32::MIN);

    /// Creates a run index, returning `None` for 0.
    pub fn new(index: u32) -> Option<Self> {
        NonZeroU32::new(index).map(Self)
    }

    /// Returns the run index as an integer.
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Returns the index of the run that follows `prior_runs` earlier runs.
    ///
    /// Saturates at `u32::MAX` runs.
    pub fn after(prior_runs: usize) -> Self {
        let prior_runs = u32::try_from(prior_runs).unwrap_or(u32::MAX);
        Self(NonZeroU32::MIN.saturating_add(prior_runs))
    }

    /// Returns the index of the run after this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    fn to_offset(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Display for RunIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an entity was defined.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceLocation {
    /// The file the entity is defined in.
    pub file: Utf8PathBuf,

    /// The 1-based line the definition starts on.
    pub line: u32,

    /// The root of the project, used to display `file` as a relative path.
    pub project_root: Utf8PathBuf,
}

impl SourceLocation {
    /// Creates a new source location.
    pub fn new(
        file: impl Into<Utf8PathBuf>,
        line: u32,
        project_root: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            project_root: project_root.into(),
        }
    }

    /// The file relative to the project root, or the file as-is if it lies outside the root.
    pub fn relative_file(&self) -> &Utf8Path {
        self.file
            .strip_prefix(&self.project_root)
            .unwrap_or(&self.file)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.relative_file(), self.line)
    }
}

/// Timing and allocation statistics recorded for a single run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunStats {
    /// Wall-clock time taken, in nanoseconds.
    pub elapsed_ns: u64,

    /// Number of bytes allocated.
    pub bytes: u64,

    /// Time spent in garbage collection, in nanoseconds.
    pub gc_ns: u64,

    /// Number of allocations.
    pub allocs: u64,

    /// Time spent compiling, in nanoseconds.
    pub compile_ns: u64,

    /// Of the compile time, the time spent recompiling, in nanoseconds.
    pub recompile_ns: u64,
}

/// The outcome of a single assertion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LeafResult {
    /// The assertion passed.
    Pass,

    /// The assertion failed. `rendering` is its human-readable description.
    Fail {
        /// The human-readable description of the failure.
        rendering: String,
    },

    /// Evaluating the assertion raised an error. `rendering` is its human-readable description.
    Error {
        /// The human-readable description of the error.
        rendering: String,
    },
}

impl LeafResult {
    /// Creates a failing result.
    pub fn fail(rendering: impl Into<String>) -> Self {
        Self::Fail {
            rendering: rendering.into(),
        }
    }

    /// Creates an erroring result.
    pub fn error(rendering: impl Into<String>) -> Self {
        Self::Error {
            rendering: rendering.into(),
        }
    }

    /// Returns the rendering of a failure or error, or `None` for a pass.
    pub fn issue_rendering(&self) -> Option<&str> {
        match self {
            Self::Pass => None,
            Self::Fail { rendering } | Self::Error { rendering } => Some(rendering),
        }
    }
}

/// A node in a result tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResultNode {
    /// A single assertion result.
    Leaf(LeafResult),

    /// A nested group of results.
    Group(TestGroup),
}

impl From<LeafResult> for ResultNode {
    fn from(leaf: LeafResult) -> Self {
        Self::Leaf(leaf)
    }
}

impl From<TestGroup> for ResultNode {
    fn from(group: TestGroup) -> Self {
        Self::Group(group)
    }
}

/// A group of test results (a test set).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestGroup {
    /// The description of the group.
    pub description: String,

    /// The results recorded in this group, in order.
    ///
    /// Passing assertions are usually only counted in `n_passed` rather than recorded here.
    pub children: Vec<ResultNode>,

    /// The number of assertions that passed directly in this group.
    pub n_passed: usize,
}

impl TestGroup {
    /// Creates an empty group with the given description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            children: Vec::new(),
            n_passed: 0,
        }
    }

    /// Adds a child node to the group.
    pub fn with_child(mut self, child: impl Into<ResultNode>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Sets the passed count for the group.
    pub fn with_passed(mut self, n_passed: usize) -> Self {
        self.n_passed = n_passed;
        self
    }

    /// Returns true if any leaf in this group or a nested group failed or errored.
    pub fn any_non_pass(&self) -> bool {
        self.children.iter().any(|child| match child {
            ResultNode::Leaf(leaf) => leaf.issue_rendering().is_some(),
            ResultNode::Group(group) => group.any_non_pass(),
        })
    }
}

/// A shared fixture that test items can depend on.
///
/// A test setup is evaluated at most once per process, so it owns a single log file rather than
/// one per run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestSetup {
    /// The name of the setup. Names are unique within a project.
    pub name: SmolStr,

    /// Where the setup is defined.
    pub location: SourceLocation,
}

impl TestSetup {
    /// Creates a new test setup.
    pub fn new(name: impl AsRef<str>, location: SourceLocation) -> Self {
        Self {
            name: SmolStr::new(name),
            location,
        }
    }
}

/// The recorded outcome of a single run of a test item.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunRecord {
    /// Statistics for the run.
    pub stats: RunStats,

    /// The root of the result tree for the run.
    pub results: TestGroup,
}

/// An independently schedulable unit of test code.
#[derive(Clone, Debug)]
pub struct TestItem {
    /// The unique identifier of the item.
    pub id: TestItemId,

    /// The display name of the item.
    pub name: String,

    /// Where the item is defined.
    pub location: SourceLocation,

    /// The worker the item was last executed on, if it ran remotely.
    pub worker: Option<WorkerId>,

    /// The position of this item in the order items were evaluated, used for `i/N` counters.
    pub eval_number: usize,

    /// The fixtures this item depends on, in declaration order.
    pub setups: Vec<Arc<TestSetup>>,

    runs: Vec<RunRecord>,
}

impl TestItem {
    /// Creates a test item that hasn't been run yet.
    pub fn new(id: TestItemId, name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            id,
            name: name.into(),
            location,
            worker: None,
            eval_number: 0,
            setups: Vec::new(),
            runs: Vec::new(),
        }
    }

    /// Sets the worker the item was executed on.
    pub fn with_worker(mut self, worker: WorkerId) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Adds a fixture dependency.
    pub fn with_setup(mut self, setup: Arc<TestSetup>) -> Self {
        self.setups.push(setup);
        self
    }

    /// Records the outcome of a run, returning its index.
    pub fn record_run(&mut self, stats: RunStats, results: TestGroup) -> RunIndex {
        self.runs.push(RunRecord { stats, results });
        RunIndex::after(self.runs.len() - 1)
    }

    /// The index the next run of this item will have: the number of prior runs plus one.
    pub fn next_run_index(&self) -> RunIndex {
        RunIndex::after(self.runs.len())
    }

    /// Returns the recorded run with the given index.
    pub fn run(&self, index: RunIndex) -> Option<&RunRecord> {
        self.runs.get(index.to_offset())
    }

    /// Returns the most recently recorded run and its index.
    pub fn last_run(&self) -> Option<(RunIndex, &RunRecord)> {
        let last = self.runs.last()?;
        Some((RunIndex::after(self.runs.len() - 1), last))
    }

    /// Returns the number of recorded runs.
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }
}
