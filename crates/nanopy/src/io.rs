use std::{
    borrow::Cow,
    collections::VecDeque,
    io::{self, BufRead as _, Write as _},
};

use crate::{exception_private::ExcType, exception_public::Exception};

/// Trait for handling output from the `print()` builtin function.
///
/// Implement this trait to capture or redirect print output. The default
/// implementation [`StdPrint`] writes to stdout.
pub trait PrintWriter {
    /// Called once for each formatted argument, separator and terminator passed to `print()`.
    fn stdout_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception>;

    /// Add a single character to stdout.
    ///
    /// Used for the default separator and newline.
    fn stdout_push(&mut self, end: char) -> Result<(), Exception>;

    /// Reads one line for `input()`, without its trailing newline.
    ///
    /// `Ok(None)` means end of input and raises `EOFError`. Writers without an
    /// input source keep the default.
    fn stdin_read_line(&mut self) -> Result<Option<String>, Exception> {
        Ok(None)
    }
}

impl<P: PrintWriter + ?Sized> PrintWriter for &mut P {
    fn stdout_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception> {
        (**self).stdout_write(output)
    }

    fn stdout_push(&mut self, end: char) -> Result<(), Exception> {
        (**self).stdout_push(end)
    }

    fn stdin_read_line(&mut self) -> Result<Option<String>, Exception> {
        (**self).stdin_read_line()
    }
}

/// Default `PrintWriter` that writes to stdout.
///
/// Output is buffered and flushed on every newline and when the writer is dropped,
/// so tracer output on stderr interleaves at line granularity.
#[derive(Debug, Default)]
pub struct StdPrint {
    buffer: String,
}

impl StdPrint {
    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(self.buffer.as_bytes());
        let _ = stdout.flush();
        self.buffer.clear();
    }
}

impl PrintWriter for StdPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception> {
        self.buffer.push_str(&output);
        if output.ends_with('\n') {
            self.flush();
        }
        Ok(())
    }

    fn stdout_push(&mut self, end: char) -> Result<(), Exception> {
        self.buffer.push(end);
        if end == '\n' {
            self.flush();
        }
        Ok(())
    }

    fn stdin_read_line(&mut self) -> Result<Option<String>, Exception> {
        // the prompt has no newline, so it is still buffered
        self.flush();
        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|err| Exception::new(ExcType::RuntimeError, Some(format!("reading stdin: {err}"))))?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}

impl Drop for StdPrint {
    fn drop(&mut self) {
        self.flush();
    }
}

/// A `PrintWriter` that collects all output into a string.
///
/// Useful for testing or capturing print output programmatically. Lines queued
/// with [`with_input`](Self::with_input) are handed to `input()` in order.
#[derive(Debug, Default)]
pub struct CollectStringPrint {
    output: String,
    input: VecDeque<String>,
}

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer whose `input()` calls read `lines`, then hit end of input.
    #[must_use]
    pub fn with_input<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            output: String::new(),
            input: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the collected output as a string slice.
    #[must_use]
    pub fn output(&self) -> &str {
        self.output.as_str()
    }

    /// Consumes the writer and returns the collected output.
    #[must_use]
    pub fn into_output(self) -> String {
        self.output
    }

    /// Discards everything collected so far.
    pub fn clear(&mut self) {
        self.output.clear();
    }
}

impl PrintWriter for CollectStringPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) -> Result<(), Exception> {
        self.output.push_str(&output);
        Ok(())
    }

    fn stdout_push(&mut self, end: char) -> Result<(), Exception> {
        self.output.push(end);
        Ok(())
    }

    fn stdin_read_line(&mut self) -> Result<Option<String>, Exception> {
        Ok(self.input.pop_front())
    }
}

/// `PrintWriter` that ignores all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn stdout_write(&mut self, _output: Cow<'_, str>) -> Result<(), Exception> {
        Ok(())
    }

    fn stdout_push(&mut self, _end: char) -> Result<(), Exception> {
        Ok(())
    }
}
