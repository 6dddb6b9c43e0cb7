use std::fmt;

use thiserror::Error;

/// Classification of a reported error, used to label loop output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Syntax,
    Runtime,
    Io,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Syntax => write!(f, "syntax error"),
            DiagnosticKind::Runtime => write!(f, "runtime error"),
            DiagnosticKind::Io => write!(f, "i/o error"),
        }
    }
}

/// Errors raised while turning source text into an expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unbalanced tuple: `{text}`")]
    UnbalancedTuple { text: String },
    #[error("expected a tuple but found `{text}`")]
    ExpectedTuple { text: String },
    #[error("unexpected input after tuple: `{text}`")]
    TrailingInput { text: String },
    #[error("unrecognized token `{text}`")]
    UnrecognizedToken { text: String },
    #[error("malformed number `{text}`")]
    MalformedNumber { text: String },
    #[error("empty expression")]
    EmptyExpression,
}

/// Errors raised while reducing an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("cannot apply `{found}`: not a procedure")]
    NotAFunction { found: String },
    #[error("undefined symbol `{name}`")]
    UndefinedSymbol { name: String },
    #[error("cannot apply an empty tuple")]
    EmptyApplication,
    #[error("`{name}` expected {expected} arguments but received {found}")]
    ArityMismatch {
        name: String,
        expected: String,
        found: usize,
    },
    #[error("`{name}` expected {expected} but found {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },
    #[error("`{name}`: division by zero")]
    DivisionByZero { name: String },
    #[error("malformed `{form}`: {reason}")]
    InvalidForm { form: String, reason: String },
    #[error("reduction did not finish within {limit} steps")]
    StepLimitExceeded { limit: usize },
}

/// Unified error type for the interpreter and its front ends.
#[derive(Debug, Error)]
pub enum SteplispError {
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Eval(#[from] EvalError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SteplispError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            SteplispError::Parse(_) => DiagnosticKind::Syntax,
            SteplispError::Eval(_) => DiagnosticKind::Runtime,
            SteplispError::Io(_) => DiagnosticKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, SteplispError>;
