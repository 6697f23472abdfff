//! conscell - run Lisp source files or start a REPL

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use conscell::{repl, Config, Session};

#[derive(Parser)]
#[command(
    name = "conscell",
    about = "Run Lisp source files or start an interactive REPL",
    long_about = None,
    after_help = "EXAMPLES:
    # Start a REPL
    conscell

    # Run a file
    conscell program.lisp

    # Evaluate an expression after loading a file
    conscell lib.lisp -e \"(reduce + (map square '(1 2 3)) 0)\""
)]
#[command(version)]
struct Cli {
    /// Source files to evaluate, in order, in a single session
    files: Vec<PathBuf>,

    /// Expression to evaluate after the files; its value is printed
    #[arg(short, long)]
    eval: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not load the map/filter/reduce prelude
    #[arg(long)]
    no_prelude: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load config")?;
    if cli.no_prelude {
        config.prelude = false;
    }

    let session = Session::with_config(&config).context("failed to start session")?;

    for file in &cli.files {
        session
            .run_file(file)
            .with_context(|| format!("error in {}", file.display()))?;
    }

    if let Some(expr) = &cli.eval {
        let value = session.eval_str(expr)?;
        writeln!(io::stdout().lock(), "{}", value).context("failed to write result")?;
    } else if cli.files.is_empty() {
        info!("starting REPL");
        let stdin = io::stdin();
        repl(&session, stdin.lock(), io::stdout(), &config.prompt)?;
    }

    Ok(())
}
