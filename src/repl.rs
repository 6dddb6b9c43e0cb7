use std::io::{self, Write};

use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    diagnostics::{Result, SteplispError},
    expr::Expr,
    runtime::{ExecutionContext, Interpreter},
};

pub const EXIT_COMMAND: &str = "(exit)";
pub const TOGGLE_STEP_COMMAND: &str = "(toggle-step)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

pub struct Repl {
    interpreter: Interpreter,
    show_steps: bool,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Self::with_context(ExecutionContext::default())
    }

    pub fn with_context(context: ExecutionContext) -> Self {
        let show_steps = context.show_steps;
        Self {
            interpreter: Interpreter::with_context(context),
            show_steps,
        }
    }

    pub fn show_steps(&self) -> bool {
        self.show_steps
    }

    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// Handles one input line, writing anything printable to `out`.
    pub fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Control> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Control::Continue);
        }
        if trimmed == EXIT_COMMAND {
            return Ok(Control::Exit);
        }
        if trimmed == TOGGLE_STEP_COMMAND {
            self.show_steps = !self.show_steps;
            tracing::debug!(show_steps = self.show_steps, "toggled step display");
            return Ok(Control::Continue);
        }

        let outcome = self.print_line(trimmed, out);
        self.interpreter.collect(None);
        outcome.map(|()| Control::Continue)
    }

    fn print_line<W: Write>(&mut self, source: &str, out: &mut W) -> Result<()> {
        let expr = self.interpreter.parse(source)?;
        if !self.show_steps {
            let value = self.interpreter.reduce(expr)?;
            if !matches!(value, Expr::Void) {
                writeln!(out, "{value}")?;
            }
            return Ok(());
        }

        // resolving a deferred token renders the same text twice
        let mut previous = None;
        for step in self.interpreter.steps(expr) {
            let step = step?;
            if matches!(step, Expr::Void | Expr::Partial(_)) {
                continue;
            }
            let rendered = step.to_string();
            if previous.as_ref() != Some(&rendered) {
                writeln!(out, "{rendered}")?;
                previous = Some(rendered);
            }
        }
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(readline_error)?;
        let stdout = io::stdout();
        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        editor.add_history_entry(line.trim()).ok();
                    }
                    match self.handle_line(&line, &mut stdout.lock()) {
                        Ok(Control::Continue) => {}
                        Ok(Control::Exit) => break,
                        Err(err) => eprintln!("{}: {err}", err.kind()),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(readline_error(err)),
            }
        }
        Ok(())
    }

    /// Ends the session, tearing down every scope it created.
    pub fn shutdown(self) -> usize {
        self.interpreter.shutdown()
    }
}

fn readline_error(err: ReadlineError) -> SteplispError {
    SteplispError::from(io::Error::new(io::ErrorKind::Other, err))
}
