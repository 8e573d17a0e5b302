use std::fmt;

use crate::{ExcType, exception_public::Exception};

/// Error type for REPL execution, separating failures by pipeline stage.
///
/// A session survives all three: the snippet's effects up to the failure are kept
/// and the next snippet runs against the same globals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplError {
    /// The snippet could not be parsed, or uses syntax the interpreter does not support.
    Parse(Exception),
    /// The program raised an error while running.
    Runtime(Exception),
    /// A memory, allocation or time limit was exceeded.
    Resource(Exception),
}

impl ReplError {
    /// The underlying exception, whatever the stage.
    #[must_use]
    pub fn exception(&self) -> &Exception {
        match self {
            Self::Parse(exc) | Self::Runtime(exc) | Self::Resource(exc) => exc,
        }
    }

    /// Sorts a run failure into `Runtime` or `Resource` by its exception type.
    pub(crate) fn from_run(exc: Exception) -> Self {
        match exc.exc_type() {
            ExcType::MemoryError | ExcType::TimeoutError => Self::Resource(exc),
            _ => Self::Runtime(exc),
        }
    }
}

impl fmt::Display for ReplError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.exception())
    }
}

impl std::error::Error for ReplError {}
