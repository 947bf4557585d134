// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    DisplayMode, DisplayTiming, EmptyTestsetsWarning,
    error_description::write_test_errors,
    helpers::{DisplayWorker, Styles},
};
use crate::{
    capture::{CapturedLogStore, LogSource},
    config::CaptureConfig,
    errors::ReportError,
    helpers::{DisplayCounterIndex, DisplayQuoted},
    output::OutputContext,
    test_model::{RunIndex, RunRecord, TestItem, TestSetup},
};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use swrite::{SWrite, swrite};

/// Builder for a [`ReportPrinter`].
#[derive(Clone, Debug, Default)]
pub struct ReportPrinterBuilder {
    display_mode: DisplayMode,
    errors_first: bool,
    verbose_results: bool,
}

impl ReportPrinterBuilder {
    /// Creates a builder with settings taken from `config`.
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            display_mode: config.display_mode,
            errors_first: config.errors_first,
            verbose_results: config.verbose_results,
        }
    }

    /// Sets the display mode.
    pub fn set_display_mode(&mut self, display_mode: DisplayMode) -> &mut Self {
        self.display_mode = display_mode;
        self
    }

    /// If set, errors are placed before captured logs in reports.
    pub fn set_errors_first(&mut self, errors_first: bool) -> &mut Self {
        self.errors_first = errors_first;
        self
    }

    /// If set, reports are composed for passing runs in `issues` mode as well.
    pub fn set_verbose_results(&mut self, verbose_results: bool) -> &mut Self {
        self.verbose_results = verbose_results;
        self
    }

    /// Builds a printer that writes to `output` and reads captured logs from `store`.
    pub fn build(&self, output: OutputContext, store: CapturedLogStore) -> ReportPrinter {
        let styles = Styles::new(output.is_colorized());
        ReportPrinter {
            output,
            store,
            display_mode: self.display_mode,
            errors_first: self.errors_first,
            verbose_results: self.verbose_results,
            styles,
        }
    }
}

/// Writes per-run reports, banners and warnings to the shared output.
///
/// Everything a `ReportPrinter` writes is assembled in memory first and then written with a
/// single call to [`OutputContext::write_all_locked`], so output from concurrent runs never
/// interleaves.
#[derive(Clone, Debug)]
pub struct ReportPrinter {
    output: OutputContext,
    store: CapturedLogStore,
    display_mode: DisplayMode,
    errors_first: bool,
    verbose_results: bool,
    styles: Styles,
}

impl ReportPrinter {
    /// Returns the display mode reports are composed with.
    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    /// Returns the store captured logs are read from.
    pub fn store(&self) -> &CapturedLogStore {
        &self.store
    }

    /// Writes the banner for a run of `item` that is about to start.
    ///
    /// `total` is the number of test items in the whole run. If it is 0, the `(i/N)` counter is
    /// omitted.
    pub fn log_run_start(&self, item: &TestItem, total: usize) -> Result<(), ReportError> {
        let mut out = self.banner_prefix("START", item, total);
        swrite!(out, " {}\n", self.display_item(item));
        self.write_locked(item, out.as_bytes())
    }

    /// Writes the banner for a run of `item` that has finished, including its timing.
    pub fn log_run_done(
        &self,
        item: &TestItem,
        run: RunIndex,
        total: usize,
    ) -> Result<(), ReportError> {
        let record = lookup_run(item, run)?;
        let mut out = self.banner_prefix("DONE", item, total);
        swrite!(
            out,
            " {} {}\n",
            self.display_item(item),
            DisplayTiming(record.stats)
        );
        self.write_locked(item, out.as_bytes())
    }

    /// Composes the report for a run of `item`, without writing it.
    ///
    /// Returns `None` if no report is composed for this run in the current display mode.
    pub fn compose_report(
        &self,
        item: &TestItem,
        run: RunIndex,
    ) -> Result<Option<ComposedReport>, ReportError> {
        let record = lookup_run(item, run)?;
        self.compose_impl(item, run, record)
    }

    /// Prints the report for a run of `item` to the shared output.
    ///
    /// The report is only written if the run failed, or if there are captured logs for it or
    /// any of its setups. Afterwards, the run's log file is deleted unless the run failed, so
    /// that failed runs keep their logs around for structured reports.
    pub fn print_report(&self, item: &TestItem, run: RunIndex) -> Result<(), ReportError> {
        let record = lookup_run(item, run)?;
        let res = self.compose_impl(item, run, record).and_then(|report| match report {
            Some(report) if report.should_flush() => self.write_locked(item, report.as_bytes()),
            _ => Ok(()),
        });

        if !record.results.any_non_pass() {
            self.store.cleanup(LogSource::item(item, run));
        }
        res
    }

    /// Prints a warning if the given run of `item` contains test sets without tests.
    ///
    /// Returns true if a warning was printed.
    pub fn print_empty_testsets_warning(
        &self,
        item: &TestItem,
        run: RunIndex,
    ) -> Result<bool, ReportError> {
        let record = lookup_run(item, run)?;
        let Some(warning) = EmptyTestsetsWarning::new(item, &record.results) else {
            return Ok(false);
        };
        let mut out = String::new();
        swrite!(out, "{}: {warning}\n", "warning".style(self.styles.warn));
        self.write_locked(item, out.as_bytes())?;
        Ok(true)
    }

    fn compose_impl(
        &self,
        item: &TestItem,
        run: RunIndex,
        record: &RunRecord,
    ) -> Result<Option<ComposedReport>, ReportError> {
        let has_errors = record.results.any_non_pass();
        let verbose = self.verbose_results && self.display_mode == DisplayMode::Issues;
        if !self.display_mode.should_compose(has_errors) && !verbose {
            return Ok(None);
        }

        let item_source = LogSource::item(item, run);
        let has_logs = self.store.has_logs(item_source)
            || item
                .setups
                .iter()
                .any(|setup| self.store.has_logs(LogSource::Setup(setup)));

        let mut buf = Vec::new();
        writeln!(buf).map_err(|error| write_error(item, error))?;
        if self.errors_first && has_errors {
            self.write_errors(item, record, &mut buf)?;
        }
        if self.display_mode.reports_logs() {
            self.write_captured_logs(item, run, &mut buf)?;
        }
        if !self.errors_first && has_errors {
            self.write_errors(item, record, &mut buf)?;
        }
        writeln!(buf).map_err(|error| write_error(item, error))?;

        Ok(Some(ComposedReport {
            buf,
            has_errors,
            has_logs,
        }))
    }

    fn write_captured_logs(
        &self,
        item: &TestItem,
        run: RunIndex,
        buf: &mut Vec<u8>,
    ) -> Result<(), ReportError> {
        for setup in &item.setups {
            self.write_setup_logs(item, setup, buf)?;
        }

        let source = LogSource::item(item, run);
        let has_logs = self.store.has_logs(source);
        let header = if has_logs {
            "Captured Logs"
        } else {
            "No Captured Logs"
        };
        writeln!(
            buf,
            "{} for test item {} at {}{}",
            header.style(self.styles.header),
            DisplayQuoted(&item.name),
            item.location.style(self.styles.location),
            DisplayWorker::Assigned(item.worker),
        )
        .map_err(|error| write_error(item, error))?;

        if has_logs {
            self.read_logs(source, buf)?;
        }
        Ok(())
    }

    fn write_setup_logs(
        &self,
        item: &TestItem,
        setup: &TestSetup,
        buf: &mut Vec<u8>,
    ) -> Result<(), ReportError> {
        let source = LogSource::Setup(setup);
        if !self.store.has_logs(source) {
            return Ok(());
        }
        writeln!(
            buf,
            "{} {} (dependency of {}) at {}{}",
            "Captured logs for test setup".style(self.styles.header),
            DisplayQuoted(&setup.name),
            DisplayQuoted(&item.name),
            setup.location.style(self.styles.location),
            DisplayWorker::Local,
        )
        .map_err(|error| write_error(item, error))?;
        self.read_logs(source, buf)
    }

    fn write_errors(
        &self,
        item: &TestItem,
        record: &RunRecord,
        buf: &mut Vec<u8>,
    ) -> Result<(), ReportError> {
        write_test_errors(
            &self.styles,
            &record.results,
            DisplayWorker::Assigned(item.worker),
            buf,
        )
        .map_err(|error| write_error(item, error))
    }

    fn read_logs(&self, source: LogSource<'_>, buf: &mut Vec<u8>) -> Result<(), ReportError> {
        self.store
            .read_into(source, buf)
            .map(|_| ())
            .map_err(|error| ReportError::ReadLogs {
                path: self.store.log_path(source),
                error,
            })
    }

    fn banner_prefix(&self, state: &str, item: &TestItem, total: usize) -> String {
        let mut out = chrono::Local::now().format("%H:%M:%S | ").to_string();
        // Pad before styling so escape codes don't count towards the width.
        let state = format!("{state:<5}");
        swrite!(out, "{}", state.style(self.styles.state));
        if total > 0 {
            swrite!(out, " {}", DisplayCounterIndex::new(item.eval_number, total));
        }
        out
    }

    fn display_item<'a>(&self, item: &'a TestItem) -> impl std::fmt::Display + 'a {
        let location = item.location.style(self.styles.location);
        DisplayItem {
            name: DisplayQuoted(&item.name),
            location,
        }
    }

    fn write_locked(&self, item: &TestItem, buf: &[u8]) -> Result<(), ReportError> {
        self.output
            .write_all_locked(buf)
            .map_err(|error| write_error(item, error))
    }
}

struct DisplayItem<'a, L> {
    name: DisplayQuoted<'a>,
    location: L,
}

impl<L: std::fmt::Display> std::fmt::Display for DisplayItem<'_, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "test item {} {}", self.name, self.location)
    }
}

/// A report composed in memory, ready to be written to the shared output.
#[derive(Clone, Debug)]
pub struct ComposedReport {
    buf: Vec<u8>,
    has_errors: bool,
    has_logs: bool,
}

impl ComposedReport {
    /// Returns the raw bytes of the report.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns true if the run had failing or erroring results.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Returns true if the run or any of its setups had captured logs.
    pub fn has_logs(&self) -> bool {
        self.has_logs
    }

    /// Returns true if the report is worth writing out.
    pub fn should_flush(&self) -> bool {
        self.has_errors || self.has_logs
    }
}

fn lookup_run(item: &TestItem, run: RunIndex) -> Result<&RunRecord, ReportError> {
    item.run(run).ok_or_else(|| ReportError::UnknownRun {
        name: item.name.clone(),
        run: run.get(),
        recorded: item.run_count(),
    })
}

fn write_error(item: &TestItem, error: io::Error) -> ReportError {
    ReportError::Write {
        name: item.name.clone(),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capture::LogPathResolver,
        test_model::{LeafResult, RunStats, SourceLocation, TestGroup, TestItemId, WorkerId},
    };
    use camino_tempfile::Utf8TempDir;
    use indoc::{formatdoc, indoc};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        _dir: Utf8TempDir,
        buf: SharedBuffer,
        store: CapturedLogStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = Utf8TempDir::new().unwrap();
            let store = CapturedLogStore::new(LogPathResolver::new(dir.path()));
            Self {
                _dir: dir,
                buf: SharedBuffer::default(),
                store,
            }
        }

        fn printer(&self, configure: impl FnOnce(&mut ReportPrinterBuilder)) -> ReportPrinter {
            let mut builder = ReportPrinterBuilder::default();
            configure(&mut builder);
            let output = OutputContext::from_writer(self.buf.clone(), false);
            builder.build(output, self.store.clone())
        }

        fn write_log(&self, source: LogSource<'_>, contents: &str) {
            std::fs::write(self.store.log_path(source), contents).unwrap();
        }
    }

    fn item() -> TestItem {
        TestItem::new(
            TestItemId::new("7"),
            "parses input",
            SourceLocation::new("/proj/test/parse_tests.rs", 12, "/proj"),
        )
    }

    fn passing() -> TestGroup {
        TestGroup::new("parses input").with_passed(3)
    }

    fn failing() -> TestGroup {
        TestGroup::new("parses input")
            .with_passed(1)
            .with_child(LeafResult::fail("Test Failed at test/parse_tests.rs:14"))
    }

    #[test]
    fn issues_mode_passing_run_prints_nothing() {
        let fixture = Fixture::new();
        let printer = fixture.printer(|_| {});
        let mut item = item();
        let run = item.record_run(RunStats::default(), passing());
        fixture.write_log(LogSource::item(&item, run), "some output\n");

        assert!(printer.compose_report(&item, run).unwrap().is_none());
        printer.print_report(&item, run).unwrap();
        assert_eq!(fixture.buf.contents(), "");
        assert!(
            !fixture.store.has_logs(LogSource::item(&item, run)),
            "log of passing run is cleaned up"
        );
    }

    #[test]
    fn failing_run_reports_logs_then_errors() {
        let fixture = Fixture::new();
        let printer = fixture.printer(|_| {});
        let mut item = item().with_worker(WorkerId(3));
        let run = item.record_run(RunStats::default(), failing());
        fixture.write_log(LogSource::item(&item, run), "debug line\n");

        printer.print_report(&item, run).unwrap();
        assert_eq!(
            fixture.buf.contents(),
            indoc! {r#"

                Captured Logs for test item "parses input" at test/parse_tests.rs:12 on worker 3
                debug line
                Error in testset "parses input" on worker 3:
                Test Failed at test/parse_tests.rs:14


            "#}
        );
        assert_eq!(
            fixture.store.surviving_log(LogSource::item(&item, run)),
            Some(fixture.store.log_path(LogSource::item(&item, run))),
            "log of failed run is kept"
        );
    }

    #[test]
    fn errors_first() {
        let fixture = Fixture::new();
        let printer = fixture.printer(|builder| {
            builder.set_errors_first(true);
        });
        let mut item = item();
        let run = item.record_run(RunStats::default(), failing());

        let report = printer.compose_report(&item, run).unwrap().unwrap();
        assert!(report.has_errors());
        assert!(!report.has_logs());
        assert_eq!(
            String::from_utf8(report.as_bytes().to_vec()).unwrap(),
            indoc! {r#"

                Error in testset "parses input":
                Test Failed at test/parse_tests.rs:14

                No Captured Logs for test item "parses input" at test/parse_tests.rs:12

            "#}
        );
    }

    #[test]
    fn batched_mode_composes_for_passing_runs() {
        let fixture = Fixture::new();
        let printer = fixture.printer(|builder| {
            builder.set_display_mode(DisplayMode::Batched);
        });
        let mut item = item();
        let first = item.record_run(RunStats::default(), passing());
        let second = item.record_run(RunStats::default(), passing());
        fixture.write_log(LogSource::item(&item, second), "second run\n");

        // A report is composed, but with nothing in it there's nothing to flush.
        let report = printer.compose_report(&item, first).unwrap().unwrap();
        assert_eq!(
            String::from_utf8(report.as_bytes().to_vec()).unwrap(),
            "\nNo Captured Logs for test item \"parses input\" at test/parse_tests.rs:12\n\n"
        );
        assert!(!report.should_flush());
        printer.print_report(&item, first).unwrap();
        assert_eq!(fixture.buf.contents(), "");

        printer.print_report(&item, second).unwrap();
        assert_eq!(
            fixture.buf.contents(),
            "\nCaptured Logs for test item \"parses input\" at test/parse_tests.rs:12\n\
             second run\n\n"
        );
        assert!(!fixture.store.has_logs(LogSource::item(&item, second)));
    }

    #[test]
    fn eager_mode_omits_logs() {
        let fixture = Fixture::new();
        let printer = fixture.printer(|builder| {
            builder.set_display_mode(DisplayMode::Eager);
        });
        let mut item = item();
        let run = item.record_run(RunStats::default(), failing());
        fixture.write_log(LogSource::item(&item, run), "already shown live\n");

        printer.print_report(&item, run).unwrap();
        assert_eq!(
            fixture.buf.contents(),
            indoc! {r#"

                Error in testset "parses input":
                Test Failed at test/parse_tests.rs:14


            "#}
        );
    }

    #[test]
    fn setup_logs_are_attributed_to_this_process() {
        let fixture = Fixture::new();
        let printer = fixture.printer(|_| {});
        let setup = Arc::new(TestSetup::new(
            "database",
            SourceLocation::new("/proj/test/setups.rs", 3, "/proj"),
        ));
        let mut item = item().with_setup(setup.clone());
        let run = item.record_run(RunStats::default(), failing());
        fixture.write_log(LogSource::Setup(&setup), "connecting\n");

        printer.print_report(&item, run).unwrap();
        let pid = std::process::id();
        assert_eq!(
            fixture.buf.contents(),
            formatdoc! {r#"

                Captured logs for test setup "database" (dependency of "parses input") at test/setups.rs:3 on worker {pid}
                connecting
                No Captured Logs for test item "parses input" at test/parse_tests.rs:12
                Error in testset "parses input":
                Test Failed at test/parse_tests.rs:14


            "#}
        );
    }

    #[test]
    fn verbose_results_flush_passing_runs_with_logs() {
        let fixture = Fixture::new();
        let printer = fixture.printer(|builder| {
            builder.set_verbose_results(true);
        });
        let mut item = item();
        let quiet = item.record_run(RunStats::default(), passing());
        let chatty = item.record_run(RunStats::default(), passing());
        fixture.write_log(LogSource::item(&item, chatty), "hello\n");

        printer.print_report(&item, quiet).unwrap();
        assert_eq!(fixture.buf.contents(), "");

        printer.print_report(&item, chatty).unwrap();
        assert_eq!(
            fixture.buf.contents(),
            "\nCaptured Logs for test item \"parses input\" at test/parse_tests.rs:12\nhello\n\n"
        );
    }

    #[test]
    fn unknown_run_is_an_error() {
        let fixture = Fixture::new();
        let printer = fixture.printer(|_| {});
        let mut item = item();
        item.record_run(RunStats::default(), passing());

        let err = printer
            .print_report(&item, RunIndex::new(2).unwrap())
            .unwrap_err();
        assert!(
            matches!(err, ReportError::UnknownRun { run: 2, recorded: 1, .. }),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn banners() {
        let fixture = Fixture::new();
        let printer = fixture.printer(|_| {});
        let mut item = item();
        item.eval_number = 3;
        let run = item.record_run(
            RunStats {
                elapsed_ns: 1_500_000_000,
                ..RunStats::default()
            },
            passing(),
        );

        printer.log_run_start(&item, 12).unwrap();
        printer.log_run_done(&item, run, 12).unwrap();
        printer.log_run_start(&item, 0).unwrap();

        let contents = fixture.buf.contents();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        // Strip the `HH:MM:SS | ` timestamp.
        let bodies: Vec<_> = lines
            .iter()
            .map(|line| {
                let (time, body) = line.split_once(" | ").expect("banner has a timestamp");
                assert_eq!(time.len(), 8, "timestamp is HH:MM:SS");
                body
            })
            .collect();
        assert_eq!(
            bodies,
            [
                r#"START ( 3/12) test item "parses input" test/parse_tests.rs:12"#,
                r#"DONE  ( 3/12) test item "parses input" test/parse_tests.rs:12 1.500000 seconds"#,
                r#"START test item "parses input" test/parse_tests.rs:12"#,
            ]
        );
    }

    #[test]
    fn empty_testsets_warning() {
        let fixture = Fixture::new();
        let printer = fixture.printer(|_| {});
        let mut item = item();
        let full = item.record_run(RunStats::default(), passing());
        let hollow = item.record_run(
            RunStats::default(),
            TestGroup::new("parses input")
                .with_passed(1)
                .with_child(TestGroup::new("edge cases")),
        );

        assert!(!printer.print_empty_testsets_warning(&item, full).unwrap());
        assert!(printer.print_empty_testsets_warning(&item, hollow).unwrap());
        assert_eq!(
            fixture.buf.contents(),
            "warning: test item \"parses input\" at test/parse_tests.rs:12 contains test sets \
             without tests:\nedge cases\n"
        );
    }
}
