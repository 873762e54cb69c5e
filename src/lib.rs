//! Statelisp - an embeddable evaluator for a small Lisp with a sandboxable state
//!
//! This crate evaluates programs of a small Lisp-family language while keeping a strict
//! line between two things:
//!
//! - a pure, serializable [`evaluator::State`] (an environment plus a reference store),
//!   which carries no executable capability and can be handed around as ordinary data;
//! - the live [`evaluator::Bindings`], which is a state plus the host-supplied capability
//!   table of primitive operations.
//!
//! ```text
//! (do
//!   (def-rec count-down (fn [n] (if (eq? n 0) :done (count-down (- n 1)))))
//!   (count-down 3))                               ; => :done
//! (base-eval '(+ 1 2) (pure-state))               ; => [3 <state>]
//! (base-eval 'secret (pure-state))                ; => UnknownIdentifier
//! ```
//!
//! A nested evaluation started through `base-eval` is rebuilt from the caller's own
//! capability table and the passed state, so it can never reach more than the enclosing
//! bindings already grant.
//!
//! ## Modules
//!
//! - `ast`: the value model, its structural equality and canonical text
//! - `env`: persistent and mutable environments
//! - `refs`: the append-only reference store
//! - `evaluator`: bindings, state, evaluation, application and special forms
//! - `builtinops`: primitive descriptors and the capability table
//! - `parser`: text to value reader
//! - `wire`: serde envelope for shipping values across a boundary
//! - `interpreter`: host embedding with per-form rollback

use crate::ast::Kind;
use crate::builtinops::ArgKind;
use std::fmt;

/// Maximum parsing depth to prevent stack overflow on hostile input
pub const MAX_PARSE_DEPTH: usize = 64;

/// Maximum nesting of evaluations, counted across closure calls and `base-eval`.
/// Set well above the parse depth so any readable form can be evaluated.
pub const MAX_EVAL_DEPTH: usize = 256;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete
    Incomplete,
    /// Expression nesting exceeded the configured depth
    TooDeeplyNested,
    /// Extra input found after a complete expression
    TrailingContent,
}

/// A structured error describing a reader failure.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Snippet of the input around the failure (max 40 chars)
    pub context: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Attach the input surrounding `offset` as context
    pub fn with_context(mut self, input: &str, offset: usize) -> Self {
        const MAX_CONTEXT: usize = 40;
        let snippet: String = input
            .get(offset..)
            .unwrap_or_default()
            .chars()
            .take(MAX_CONTEXT)
            .collect();
        self.context = Some(snippet.replace('\n', "\\n"));
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(context) = &self.context {
            write!(f, " near '{context}'")?;
        }
        Ok(())
    }
}

/// Field-less discriminant of [`Error`], for callers that branch on the failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    SpecialForm,
    WrongNumberArgs,
    Type,
    PatternMatch,
    NonFunctionCalled,
    UnknownIdentifier,
    Impossible,
    InvalidDeclaration,
    UndefinedExports,
    Other,
    Thrown,
}

/// Every failure the evaluator, its primitives or the reader can produce.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("ParseError: {0}")]
    Parse(ParseError),

    /// Malformed special-form syntax
    #[error("SpecialForm({form}): {message}")]
    SpecialForm { form: String, message: String },

    #[error("WrongNumberArgs({op}): expected {expected} but got {actual}")]
    WrongNumberArgs {
        op: String,
        expected: usize,
        actual: usize,
    },

    #[error("TypeError({op}): expected {expected} but got {actual}")]
    Type {
        op: String,
        expected: ArgKind,
        actual: Kind,
    },

    /// Reserved for a pattern-matching form; no shipped form raises it.
    #[error("PatternMatch({op}): {message}")]
    PatternMatch { op: String, message: String },

    #[error("NonFunctionCalled: {0}")]
    NonFunctionCalled(Value),

    #[error("UnknownIdentifier: {0}")]
    UnknownIdentifier(String),

    /// An internal invariant was violated (e.g. a dangling reference index).
    #[error("Impossible({op}): {message}")]
    Impossible { op: String, message: String },

    #[error("InvalidDeclaration: {message} in {value}")]
    InvalidDeclaration { message: String, value: Value },

    #[error("UndefinedExports: {}", .0.join(", "))]
    UndefinedExports(Vec<String>),

    #[error("Other({op}): {message}")]
    Other { op: String, message: String },

    /// Raised by the `throw` primitive.
    #[error("Thrown({label}): {payload}")]
    Thrown { label: String, payload: Value },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse(_) => ErrorKind::Parse,
            Error::SpecialForm { .. } => ErrorKind::SpecialForm,
            Error::WrongNumberArgs { .. } => ErrorKind::WrongNumberArgs,
            Error::Type { .. } => ErrorKind::Type,
            Error::PatternMatch { .. } => ErrorKind::PatternMatch,
            Error::NonFunctionCalled(_) => ErrorKind::NonFunctionCalled,
            Error::UnknownIdentifier(_) => ErrorKind::UnknownIdentifier,
            Error::Impossible { .. } => ErrorKind::Impossible,
            Error::InvalidDeclaration { .. } => ErrorKind::InvalidDeclaration,
            Error::UndefinedExports(_) => ErrorKind::UndefinedExports,
            Error::Other { .. } => ErrorKind::Other,
            Error::Thrown { .. } => ErrorKind::Thrown,
        }
    }

    /// The operation the error originated from, when one is recorded.
    pub fn label(&self) -> Option<&str> {
        match self {
            Error::SpecialForm { form: op, .. }
            | Error::WrongNumberArgs { op, .. }
            | Error::Type { op, .. }
            | Error::PatternMatch { op, .. }
            | Error::Impossible { op, .. }
            | Error::Other { op, .. } => Some(op),
            Error::InvalidDeclaration { .. } | Error::UndefinedExports(_) => Some("module"),
            Error::Thrown { label, .. } => Some(label),
            Error::Parse(_) | Error::NonFunctionCalled(_) | Error::UnknownIdentifier(_) => None,
        }
    }

    pub(crate) fn special_form(form: &str, message: impl Into<String>) -> Self {
        Error::SpecialForm {
            form: form.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn arity(op: &str, expected: usize, actual: usize) -> Self {
        Error::WrongNumberArgs {
            op: op.to_owned(),
            expected,
            actual,
        }
    }

    pub(crate) fn type_error(op: &str, expected: impl Into<ArgKind>, actual: &Value) -> Self {
        Error::Type {
            op: op.to_owned(),
            expected: expected.into(),
            actual: actual.kind(),
        }
    }

    pub(crate) fn impossible(op: &str, message: impl Into<String>) -> Self {
        Error::Impossible {
            op: op.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn other(op: &str, message: impl Into<String>) -> Self {
        Error::Other {
            op: op.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_declaration(message: impl Into<String>, value: &Value) -> Self {
        Error::InvalidDeclaration {
            message: message.into(),
            value: value.clone(),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

pub mod ast;
pub mod builtinops;
pub mod env;
pub mod evaluator;
pub mod interpreter;
pub mod refs;

#[cfg(feature = "parser")]
pub mod parser;

#[cfg(feature = "wire")]
pub mod wire;

pub use ast::Value;
pub use evaluator::{Bindings, State, eval};
pub use interpreter::Interpreter;
