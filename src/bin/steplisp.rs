use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::{Parser, Subcommand};

use steplisp::{runtime::DEFAULT_STEP_LIMIT, Control, ExecutionContext, Repl, SteplispError};

#[derive(Parser)]
#[command(author, version, about = "Small-step s-expression interpreter")]
struct Args {
    /// Reduction steps allowed per expression
    #[arg(long, global = true, default_value_t = DEFAULT_STEP_LIMIT)]
    step_limit: usize,
    /// Print every intermediate reduction step
    #[arg(long, global = true)]
    steps: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive session
    Repl,
    /// Evaluate a single expression and print its value
    Eval { source: String },
    /// Evaluate a script, one expression per line
    Run { script: PathBuf },
}

fn main() -> ExitCode {
    steplisp::init_tracing();
    let args = Args::parse();
    match dispatch(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}: {err}", err.kind());
            ExitCode::FAILURE
        }
    }
}

fn dispatch(args: Args) -> Result<(), SteplispError> {
    let context = ExecutionContext {
        step_limit: args.step_limit,
        show_steps: args.steps,
    };
    match args.command.unwrap_or(Command::Repl) {
        Command::Repl => {
            println!("steplisp {}", env!("CARGO_PKG_VERSION"));
            println!("Run '(exit)' to exit, '(toggle-step)' to show reduction steps.");
            let mut repl = Repl::with_context(context);
            repl.run()?;
            repl.shutdown();
            Ok(())
        }
        Command::Eval { source } => {
            let mut repl = Repl::with_context(context);
            repl.handle_line(&source, &mut io::stdout().lock())?;
            Ok(())
        }
        Command::Run { script } => run_script(script, context),
    }
}

fn run_script(path: PathBuf, context: ExecutionContext) -> Result<(), SteplispError> {
    let source = fs::read_to_string(&path)?;
    let mut repl = Repl::with_context(context);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if repl.handle_line(line, &mut out)? == Control::Exit {
            break;
        }
    }
    out.flush()?;
    repl.shutdown();
    Ok(())
}
