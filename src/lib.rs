//! A small-step interpreter for a Lisp-like s-expression language.
//!
//! A line of text is parsed into an [`Expr`] tree under a [`ScopeId`], then
//! reduced one step at a time until a value remains. [`Interpreter::steps`]
//! exposes every intermediate state for step tracing.

use std::sync::Once;

pub mod diagnostics;
pub mod expr;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod scope;
pub mod stdlib;

pub use diagnostics::{DiagnosticKind, EvalError, ParseError, SteplispError};
pub use expr::{Expr, Function};
pub use repl::{Control, Repl};
pub use runtime::{ExecutionContext, Interpreter, Steps};
pub use scope::{ScopeArena, ScopeId};

static TRACING_INIT: Once = Once::new();

/// Installs a `tracing` subscriber filtered by `RUST_LOG`. Does nothing when
/// the variable is unset, so interactive output stays clean.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
