// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped redirection of ambient output.
//!
//! Test code doesn't write to the process's standard output directly. Instead it writes to the
//! *ambient* output, through [`AmbientWriter`], the [`ambient_print`](crate::ambient_print) and
//! [`ambient_println`](crate::ambient_println) macros, or `tracing` events once
//! [`init_logging`](crate::output::init_logging) has been called. By default the ambient output
//! is the process's standard output; within [`LogRedirector::redirect`] it's the redirection
//! target.
//!
//! There is a single ambient stream: output that a test would send to standard error is merged
//! with standard output, so a capture holds both in the order they were written. Outside any
//! redirection, ambient output goes to the process's standard output.
//!
//! Redirection is scoped to an execution context: a thread for synchronous work
//! ([`LogRedirector::redirect`]) and a task for async work ([`LogRedirector::redirect_async`]).
//! Concurrent runs on different threads or tasks therefore capture independently.

use crate::{errors::RedirectError, output::OutputContext};
use camino::Utf8PathBuf;
use debug_ignore::DebugIgnore;
use std::{
    cell::RefCell,
    fmt,
    fs::File,
    future::Future,
    io::{self, Write},
    sync::{Arc, Mutex, PoisonError},
};
use tracing::debug;
use tracing_subscriber::fmt::MakeWriter;

thread_local! {
    static THREAD_CAPTURE: RefCell<Option<Arc<ActiveCapture>>> = const { RefCell::new(None) };
}

tokio::task_local! {
    static TASK_CAPTURE: Arc<ActiveCapture>;
}

/// An already-open destination for captured output.
///
/// Clones refer to the same destination. Two sinks are the same target iff one is a clone of the
/// other.
#[derive(Clone, Debug)]
pub struct CaptureSink {
    writer: Arc<Mutex<DebugIgnore<Box<dyn Write + Send>>>>,
}

impl CaptureSink {
    /// Creates a sink that writes to `writer`.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(DebugIgnore(Box::new(writer)))),
        }
    }

    fn same_sink(&self, other: &CaptureSink) -> bool {
        Arc::ptr_eq(&self.writer, &other.writer)
    }

    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(buf)
    }

    fn flush(&self) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.flush()
    }
}

/// Where to send ambient output for the duration of a unit of work.
#[derive(Clone, Debug)]
pub enum RedirectTarget {
    /// A file, created or truncated when redirection starts and closed when it ends.
    Path(Utf8PathBuf),

    /// An already-open sink. The sink inherits the color context of the shared output.
    Sink(CaptureSink),

    /// A shared output stream. Redirecting to the redirector's own shared output is a no-op.
    Output(OutputContext),
}

impl fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "`{path}`"),
            Self::Sink(_) => write!(f, "a capture sink"),
            Self::Output(_) => write!(f, "a shared output stream"),
        }
    }
}

#[derive(Debug)]
enum ActiveTarget {
    File {
        path: Utf8PathBuf,
        file: Mutex<File>,
    },
    Sink(CaptureSink),
    Output(OutputContext),
}

/// The capture that is active in an execution context.
#[derive(Debug)]
struct ActiveCapture {
    target: ActiveTarget,
    is_colorized: bool,
    // False when the target is the redirector's own shared output: ambient writes are routed to
    // it, but nothing is being captured away from it.
    captures: bool,
}

impl ActiveCapture {
    fn describe(&self) -> String {
        match &self.target {
            ActiveTarget::File { path, .. } => format!("`{path}`"),
            ActiveTarget::Sink(_) => "a capture sink".to_owned(),
            ActiveTarget::Output(_) => "a shared output stream".to_owned(),
        }
    }

    fn is_same_target(&self, target: &RedirectTarget) -> bool {
        match (&self.target, target) {
            (ActiveTarget::File { path, .. }, RedirectTarget::Path(other)) => path == other,
            (ActiveTarget::Sink(sink), RedirectTarget::Sink(other)) => sink.same_sink(other),
            (ActiveTarget::Output(output), RedirectTarget::Output(other)) => {
                output.same_output(other)
            }
            _ => false,
        }
    }

    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        match &self.target {
            ActiveTarget::File { file, .. } => file
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .write_all(buf),
            ActiveTarget::Sink(sink) => sink.write_all(buf),
            ActiveTarget::Output(output) => output.write_all_locked(buf),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match &self.target {
            ActiveTarget::File { file, .. } => file
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .flush(),
            ActiveTarget::Sink(sink) => sink.flush(),
            // Shared output writes are flushed as part of each locked write.
            ActiveTarget::Output(_) => Ok(()),
        }
    }
}

fn current_capture() -> Option<Arc<ActiveCapture>> {
    TASK_CAPTURE
        .try_with(Arc::clone)
        .ok()
        .or_else(|| THREAD_CAPTURE.with(|current| current.borrow().clone()))
}

/// Restores the previous thread capture on drop, including during unwinding.
struct ThreadCaptureGuard {
    previous: Option<Arc<ActiveCapture>>,
}

impl ThreadCaptureGuard {
    fn install(capture: Arc<ActiveCapture>) -> Self {
        let previous = THREAD_CAPTURE.with(|current| current.borrow_mut().replace(capture));
        Self { previous }
    }
}

impl Drop for ThreadCaptureGuard {
    fn drop(&mut self) {
        let ended = THREAD_CAPTURE.with(|current| {
            std::mem::replace(&mut *current.borrow_mut(), self.previous.take())
        });
        if let Some(ended) = ended
            && let Err(error) = ended.flush()
        {
            debug!("failed to flush captured output: {error}");
        }
    }
}

/// What to do in response to a redirection request.
enum RedirectPlan {
    /// Run the work without changing the ambient output.
    Passthrough,
    /// Run the work with this capture active.
    Capture(Arc<ActiveCapture>),
}

/// Replaces the ambient output for the duration of a unit of work.
#[derive(Clone, Debug)]
pub struct LogRedirector {
    output: OutputContext,
}

impl LogRedirector {
    /// Creates a redirector for the given shared output.
    pub fn new(output: OutputContext) -> Self {
        Self { output }
    }

    /// Runs `work` with the ambient output redirected to `target`, then restores the previous
    /// ambient output.
    ///
    /// The previous output is restored on every exit path, including panics. A path target is
    /// closed once `work` completes.
    ///
    /// Redirecting to the redirector's own shared output routes ambient output to it through
    /// [`OutputContext::write_all_locked`] without capturing anything; if a capture is already
    /// active, output keeps flowing to that capture. Redirecting to the target that is already
    /// active in this execution context runs `work` without redirecting. Redirecting to a
    /// different target while one is active returns [`RedirectError::AlreadyRedirected`] without
    /// running `work`.
    pub fn redirect<T>(
        &self,
        target: RedirectTarget,
        work: impl FnOnce() -> T,
    ) -> Result<T, RedirectError> {
        match self.plan(target)? {
            RedirectPlan::Passthrough => Ok(work()),
            RedirectPlan::Capture(capture) => {
                let _guard = ThreadCaptureGuard::install(capture);
                Ok(work())
            }
        }
    }

    /// Runs the future `work` with the ambient output of its task redirected to `target`.
    ///
    /// This follows the same rules as [`redirect`](Self::redirect), scoped to the task polling
    /// `work` rather than to the current thread.
    pub async fn redirect_async<F>(
        &self,
        target: RedirectTarget,
        work: F,
    ) -> Result<F::Output, RedirectError>
    where
        F: Future,
    {
        match self.plan(target)? {
            RedirectPlan::Passthrough => Ok(work.await),
            RedirectPlan::Capture(capture) => {
                let ret = TASK_CAPTURE.scope(capture.clone(), work).await;
                if let Err(error) = capture.flush() {
                    debug!("failed to flush captured output: {error}");
                }
                Ok(ret)
            }
        }
    }

    fn plan(&self, target: RedirectTarget) -> Result<RedirectPlan, RedirectError> {
        let active = current_capture().filter(|active| active.captures);

        if let RedirectTarget::Output(output) = &target
            && output.same_output(&self.output)
        {
            if active.is_some() {
                // Output keeps flowing to the capture that's already active.
                return Ok(RedirectPlan::Passthrough);
            }
            debug!("redirect target is the shared output, routing ambient output to it");
            return Ok(RedirectPlan::Capture(Arc::new(ActiveCapture {
                target: ActiveTarget::Output(output.clone()),
                is_colorized: output.is_colorized(),
                captures: false,
            })));
        }

        if let Some(active) = active {
            if active.is_same_target(&target) {
                return Ok(RedirectPlan::Passthrough);
            }
            return Err(RedirectError::AlreadyRedirected {
                active: active.describe(),
                requested: target.to_string(),
            });
        }

        let capture = match target {
            RedirectTarget::Path(path) => {
                let file = File::create(&path).map_err(|error| RedirectError::Open {
                    path: path.clone(),
                    error,
                })?;
                debug!("capturing output to `{path}`");
                ActiveCapture {
                    target: ActiveTarget::File {
                        path,
                        file: Mutex::new(file),
                    },
                    is_colorized: false,
                    captures: true,
                }
            }
            RedirectTarget::Sink(sink) => ActiveCapture {
                target: ActiveTarget::Sink(sink),
                is_colorized: self.output.is_colorized(),
                captures: true,
            },
            RedirectTarget::Output(output) => {
                let is_colorized = output.is_colorized();
                ActiveCapture {
                    target: ActiveTarget::Output(output),
                    is_colorized,
                    captures: true,
                }
            }
        };

        Ok(RedirectPlan::Capture(Arc::new(capture)))
    }
}

/// A handle to the ambient output of the current execution context.
///
/// The handle resolves the ambient output when it's created: create a new handle rather than
/// holding one across a redirection boundary.
#[derive(Debug)]
pub struct AmbientWriter {
    capture: Option<Arc<ActiveCapture>>,
}

impl AmbientWriter {
    /// Returns a handle to the current ambient output.
    pub fn new() -> Self {
        Self {
            capture: current_capture(),
        }
    }

    /// Returns true if output is currently being captured away from the shared output.
    pub fn is_redirected(&self) -> bool {
        self.capture.as_ref().is_some_and(|capture| capture.captures)
    }

    /// Returns true if the ambient output should be colorized.
    ///
    /// Process standard output is never considered colorized: color decisions for it belong to
    /// the [`OutputContext`].
    pub fn is_colorized(&self) -> bool {
        self.capture
            .as_ref()
            .is_some_and(|capture| capture.is_colorized)
    }
}

impl Default for AmbientWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for AmbientWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Write the whole buffer at once so lines from one call never split.
        match &self.capture {
            Some(capture) => capture.write_all(buf)?,
            None => io::stdout().lock().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match &self.capture {
            Some(capture) => capture.flush(),
            None => io::stdout().flush(),
        }
    }
}

/// A [`MakeWriter`] routing `tracing` output to the ambient output.
#[derive(Clone, Copy, Debug, Default)]
pub struct AmbientMakeWriter {
    _private: (),
}

impl AmbientMakeWriter {
    /// Creates a new `AmbientMakeWriter`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<'a> MakeWriter<'a> for AmbientMakeWriter {
    type Writer = AmbientWriter;

    fn make_writer(&'a self) -> Self::Writer {
        AmbientWriter::new()
    }
}

#[doc(hidden)]
pub fn write_ambient_fmt(args: fmt::Arguments<'_>) -> io::Result<()> {
    AmbientWriter::new().write_fmt(args)
}

/// Prints to the ambient output.
///
/// Returns an [`io::Result`], like [`write!`].
#[macro_export]
macro_rules! ambient_print {
    ($($arg:tt)*) => {
        $crate::capture::write_ambient_fmt(::std::format_args!($($arg)*))
    };
}

/// Prints to the ambient output, with a newline.
///
/// Returns an [`io::Result`], like [`writeln!`].
#[macro_export]
macro_rules! ambient_println {
    () => {
        $crate::capture::write_ambient_fmt(::std::format_args!("\n"))
    };
    ($($arg:tt)*) => {
        $crate::capture::write_ambient_fmt(::std::format_args!(
            "{}\n",
            ::std::format_args!($($arg)*)
        ))
    };
}
