//! Error channel types.
//!
//! Runtime throws travel as [`RunError`] on the `Err` side of every
//! evaluator (`RunResult<T>`), carrying the thrown ECMAScript value — a
//! user-thrown string is indistinguishable from an engine-raised TypeError
//! object, exactly as §7 requires. Break/continue/return travel separately
//! as Completions; only `throw` uses this channel.
//!
//! At the embedding boundary an uncaught [`RunError`] is rendered into a
//! host-friendly [`Exception`] with the throw location and the call
//! traceback captured at throw time.

use std::fmt;

use strum::Display;

use crate::{intern::StringId, value::Value};

/// Result alias used by every evaluator and internal method.
pub type RunResult<T> = Result<T, RunError>;

/// The standard error classes of §15.11, names only; their prototypes are
/// built at interpreter init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    Error,
    EvalError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
    #[strum(serialize = "URIError")]
    UriError,
}

impl ErrorKind {
    /// All kinds, in prototype-construction order.
    pub const ALL: [Self; 7] = [
        Self::Error,
        Self::EvalError,
        Self::RangeError,
        Self::ReferenceError,
        Self::SyntaxError,
        Self::TypeError,
        Self::UriError,
    ];
}

/// A source position for diagnostics: 1-based line within the named input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeLoc {
    pub line: u32,
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.line)
    }
}

/// Whether a traceback frame entered through [[Call]] or [[Construct]].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CallKind {
    #[strum(serialize = "call")]
    Call,
    #[strum(serialize = "construct")]
    Construct,
}

/// One frame of the call traceback, pushed on entry to any call or
/// construct and popped on exit.
#[derive(Debug, Clone, Copy)]
pub struct TracebackFrame {
    /// Name of the callee, when it has one.
    pub callee: Option<StringId>,
    /// Location of the call site.
    pub location: CodeLoc,
    pub kind: CallKind,
}

/// A thrown value in flight.
///
/// `location` is the position of the `throw` (or of the failing operation)
/// and `traceback` the call frames active at throw time, innermost last.
#[derive(Debug, Clone)]
pub struct RunError {
    pub value: Value,
    pub location: Option<CodeLoc>,
    pub traceback: Vec<TracebackFrame>,
}

impl RunError {
    /// Wraps an already-evaluated value for throwing; the interpreter fills
    /// in location and traceback as the error crosses it.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            value,
            location: None,
            traceback: Vec::new(),
        }
    }

    /// Attaches a location if none was recorded closer to the throw.
    #[must_use]
    pub fn with_location(mut self, loc: CodeLoc) -> Self {
        self.location.get_or_insert(loc);
        self
    }
}

/// A parse failure: script-independent message plus the offending line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

impl ParseError {
    #[must_use]
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// One rendered traceback line of an [`Exception`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub callee: String,
    pub line: u32,
    pub kind: CallKind,
}

/// An uncaught error rendered for the host: what was thrown, where, and the
/// call path that led there.
///
/// Produced at the embedding boundary by the interpreter; inside the engine
/// errors stay as [`RunError`] so scripts can catch them.
#[derive(Debug, Clone)]
pub struct Exception {
    /// Human-readable rendering of the thrown value (`"TypeError: x is not
    /// a function"` for error objects, the display form otherwise).
    pub message: String,
    pub location: Option<CodeLoc>,
    /// Call frames active at throw time, outermost first.
    pub frames: Vec<StackFrame>,
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(f, "{}: {}", loc, self.message)?,
            None => write!(f, "{}", self.message)?,
        }
        for frame in &self.frames {
            write!(f, "\n  at {} ({}, line {})", frame.callee, frame.kind, frame.line)?;
        }
        Ok(())
    }
}

impl std::error::Error for Exception {}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn error_kind_names() {
        assert_eq!(ErrorKind::TypeError.to_string(), "TypeError");
        assert_eq!(ErrorKind::UriError.to_string(), "URIError");
    }

    #[test]
    fn exception_display_includes_frames() {
        let exc = Exception {
            message: "ReferenceError: boom is not defined".to_owned(),
            location: Some(CodeLoc { line: 3 }),
            frames: vec![StackFrame {
                callee: "outer".to_owned(),
                line: 9,
                kind: CallKind::Call,
            }],
        };
        let rendered = exc.to_string();
        assert_eq!(
            rendered,
            "line 3: ReferenceError: boom is not defined\n  at outer (call, line 9)"
        );
    }
}
