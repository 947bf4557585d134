// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The shared output stream, colorization, and logging setup.
//!
//! The main type here is [`OutputContext`]. It represents the process's original output
//! destination and is created once, before any output is redirected. Every banner and report
//! ends up on it, written through a single lock so that concurrently produced reports never
//! interleave.

use crate::capture::AmbientMakeWriter;
use debug_ignore::DebugIgnore;
use owo_colors::{OwoColorize, Style, style};
use serde::Deserialize;
use std::{
    fmt,
    io::{self, Write},
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// The environment variable used to configure log filtering.
pub const LOG_ENV: &str = "TESTLOG_LOG";

/// Specifies whether to colorize output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Color {
    /// Determine colorization based on whether the terminal supports it.
    #[default]
    Auto,

    /// Always colorize.
    Always,

    /// Never colorize.
    Never,
}

impl Color {
    /// Returns true if output to the given stream should be colorized.
    pub fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

/// The process-wide shared output stream.
///
/// Cloning an `OutputContext` is cheap, and all clones refer to the same destination and lock.
#[derive(Clone, Debug)]
pub struct OutputContext {
    inner: Arc<OutputContextInner>,
}

#[derive(Debug)]
struct OutputContextInner {
    writer: Mutex<DebugIgnore<Box<dyn Write + Send>>>,
    is_colorized: bool,
}

impl OutputContext {
    /// Captures the process's standard output as the shared output stream.
    ///
    /// This must be called before any output is redirected.
    pub fn stdout(color: Color) -> Self {
        let is_colorized = color.should_colorize(supports_color::Stream::Stdout);
        Self::from_writer(io::stdout(), is_colorized)
    }

    /// Captures the process's standard error as the shared output stream.
    pub fn stderr(color: Color) -> Self {
        let is_colorized = color.should_colorize(supports_color::Stream::Stderr);
        Self::from_writer(io::stderr(), is_colorized)
    }

    /// Uses an arbitrary writer as the shared output stream.
    pub fn from_writer(writer: impl Write + Send + 'static, is_colorized: bool) -> Self {
        Self {
            inner: Arc::new(OutputContextInner {
                writer: Mutex::new(DebugIgnore(Box::new(writer))),
                is_colorized,
            }),
        }
    }

    /// Returns true if output written to this stream is colorized.
    pub fn is_colorized(&self) -> bool {
        self.inner.is_colorized
    }

    /// Returns true if `self` and `other` refer to the same shared output stream.
    pub fn same_output(&self, other: &OutputContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Writes `buf` to the shared output in a single locked operation, then flushes.
    ///
    /// Callers must assemble everything they want to appear contiguously into `buf` before
    /// calling this.
    pub fn write_all_locked(&self, buf: &[u8]) -> io::Result<()> {
        // The critical section only writes and flushes, and never calls back into this crate.
        // A panic while holding the lock can't leave the writer in a state worse than a partial
        // write, so recover from poisoning.
        let mut writer = self
            .inner
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        writer.write_all(buf)?;
        writer.flush()
    }
}

static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

/// Installs a global `tracing` subscriber that writes to the ambient output.
///
/// Log messages emitted while output is redirected are captured into the active target along
/// with everything else. Filtering is controlled by the [`LOG_ENV`] environment variable, which
/// uses the `tracing_subscriber` `Targets` syntax and defaults to `info`.
///
/// Calling this more than once has no effect.
pub fn init_logging(color: Color) {
    let mut log_styles = LogStyles::default();
    if color.should_colorize(supports_color::Stream::Stdout) {
        log_styles.colorize();
    }

    INIT_LOGGER.call_once(|| {
        let level_str = std::env::var(LOG_ENV).unwrap_or_default();

        // If the level string is empty or invalid, use the standard level filter instead.
        let targets = match level_str.parse::<Targets>() {
            Ok(targets) if !level_str.is_empty() => targets,
            _ => Targets::new().with_default(LevelFilter::INFO),
        };

        let layer = tracing_subscriber::fmt::layer()
            .event_format(SimpleFormatter { styles: log_styles })
            .with_writer(AmbientMakeWriter::new())
            .with_filter(targets);

        // Another subscriber may already be installed (e.g. by the test harness embedding us).
        let _ = tracing_subscriber::registry().with(layer).try_init();
    });
}

struct SimpleFormatter {
    styles: LogStyles,
}

impl<S, N> FormatEvent<S, N> for SimpleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        match *metadata.level() {
            Level::ERROR => write!(writer, "{}: ", "error".style(self.styles.error))?,
            Level::WARN => write!(writer, "{}: ", "warning".style(self.styles.warning))?,
            Level::INFO => write!(writer, "{}: ", "info".style(self.styles.info))?,
            Level::DEBUG => write!(writer, "{}: ", "debug".style(self.styles.debug))?,
            Level::TRACE => write!(writer, "{}: ", "trace".style(self.styles.trace))?,
        }

        let mut visitor = MessageVisitor {
            writer: &mut writer,
            error: None,
        };

        event.record(&mut visitor);

        if let Some(error) = visitor.error {
            return Err(error);
        }

        writeln!(writer)
    }
}

static MESSAGE_FIELD: &str = "message";

struct MessageVisitor<'writer, 'a> {
    writer: &'a mut format::Writer<'writer>,
    error: Option<fmt::Error>,
}

impl Visit for MessageVisitor<'_, '_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == MESSAGE_FIELD
            && let Err(error) = write!(self.writer, "{value:?}")
        {
            self.error = Some(error);
        }
    }
}

#[derive(Debug, Default)]
struct LogStyles {
    error: Style,
    warning: Style,
    info: Style,
    debug: Style,
    trace: Style,
}

impl LogStyles {
    fn colorize(&mut self) {
        self.error = style().red().bold();
        self.warning = style().yellow().bold();
        self.info = style().bold();
        self.debug = style().bold();
        self.trace = style().dimmed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn clones_share_one_output() {
        let buf = SharedBuffer::default();
        let output = OutputContext::from_writer(buf.clone(), false);
        let other = OutputContext::from_writer(SharedBuffer::default(), false);

        assert!(output.same_output(&output.clone()));
        assert!(!output.same_output(&other));

        output.write_all_locked(b"one\n").unwrap();
        output.clone().write_all_locked(b"two\n").unwrap();
        assert_eq!(&*buf.0.lock().unwrap(), b"one\ntwo\n");
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let buf = SharedBuffer::default();
        let output = OutputContext::from_writer(buf.clone(), false);

        let poisoner = output.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.inner.writer.lock().unwrap();
            panic!("poison the output lock");
        })
        .join();

        output.write_all_locked(b"still writable\n").unwrap();
        assert_eq!(&*buf.0.lock().unwrap(), b"still writable\n");
    }

    #[test]
    fn color_overrides() {
        assert!(Color::Always.should_colorize(supports_color::Stream::Stdout));
        assert!(!Color::Never.should_colorize(supports_color::Stream::Stdout));
    }
}
