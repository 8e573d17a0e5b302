use std::fmt::{self, Write};

use crate::{
    exception_private::{ExcType, RawStackFrame},
    intern::Interns,
    parse::CodeRange,
};

/// A line/column position in source code, both 1-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

impl CodeLoc {
    /// Builds a location from a 0-indexed line number and a 0-indexed column.
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line: u32::try_from(line + 1).unwrap_or(u32::MAX),
            column: u32::try_from(column + 1).unwrap_or(u32::MAX),
        }
    }
}

/// One entry of a traceback.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StackFrame {
    pub filename: String,
    pub start: CodeLoc,
    pub end: CodeLoc,
    /// Function name, `<module>` for top-level code, or `None` for syntax errors.
    pub frame_name: Option<String>,
    /// The source line the frame points at, with leading whitespace removed.
    pub preview_line: Option<String>,
}

impl StackFrame {
    pub(crate) fn from_raw(frame: &RawStackFrame, interns: &Interns, source: &str) -> Self {
        let mut stack_frame = Self::from_position(frame.position, interns.get_str(frame.position.filename), source);
        stack_frame.frame_name = Some(interns.get_str(frame.frame_name).to_owned());
        stack_frame
    }

    pub(crate) fn from_position(position: CodeRange, filename: &str, source: &str) -> Self {
        let preview_line = position
            .preview_line_number()
            .and_then(|line| source.lines().nth(line as usize))
            .map(|line| line.trim().to_owned());
        Self {
            filename: filename.to_owned(),
            start: position.start(),
            end: position.end(),
            frame_name: None,
            preview_line,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  File \"{}\", line {}", self.filename, self.start.line)?;
        if let Some(name) = &self.frame_name {
            write!(f, ", in {name}")?;
        }
        if let Some(line) = &self.preview_line {
            write!(f, "\n    {line}")?;
        }
        Ok(())
    }
}

/// An error raised while parsing or running a program.
///
/// Displays the way CPython prints an uncaught exception: the traceback, most
/// recent call last, followed by `ExcType: message`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Exception {
    exc_type: ExcType,
    message: Option<String>,
    traceback: Vec<StackFrame>,
}

impl Exception {
    #[must_use]
    pub fn new(exc_type: ExcType, message: Option<String>) -> Self {
        Self {
            exc_type,
            message,
            traceback: Vec::new(),
        }
    }

    #[must_use]
    pub fn new_full(exc_type: ExcType, message: Option<String>, traceback: Vec<StackFrame>) -> Self {
        Self {
            exc_type,
            message,
            traceback,
        }
    }

    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[must_use]
    pub fn into_message(self) -> Option<String> {
        self.message
    }

    #[must_use]
    pub fn traceback(&self) -> &[StackFrame] {
        &self.traceback
    }

    /// The status passed to `exit()`, or `None` for any other exception.
    ///
    /// A message that is not an integer, such as `exit('bad input')`, gives status 1.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        if self.exc_type != ExcType::SystemExit {
            return None;
        }
        Some(match self.message.as_deref() {
            None => 0,
            Some(code) => code.parse().unwrap_or(1),
        })
    }

    /// The last line of the traceback, e.g. `NameError: name 'x' is not defined`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut s = self.exc_type.to_string();
        if let Some(message) = &self.message
            && !message.is_empty()
        {
            let _ = write!(s, ": {message}");
        }
        s
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.traceback.is_empty() {
            writeln!(f, "Traceback (most recent call last):")?;
            for frame in &self.traceback {
                writeln!(f, "{frame}")?;
            }
        }
        f.write_str(&self.summary())
    }
}

impl std::error::Error for Exception {}
