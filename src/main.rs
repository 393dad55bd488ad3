//! Memento Mirror CLI entry point.

use clap::Parser;
use mm::cli::commands;
use mm::cli::{Cli, Commands};
use mm::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    init_tracing(cli.verbose, cli.quiet);

    // --json or non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let db = cli.db.as_ref();
    let config = cli.config.as_ref();

    match &cli.command {
        Commands::Init { force } => commands::init::execute(*force, db, config, json),
        Commands::Version => commands::version::execute(json),
        Commands::Sync(args) => commands::sync::execute(args, db, config, json),
        Commands::Probe(args) => commands::probe::execute(args, config, json),
        Commands::Libraries => commands::libraries::execute(config, json),
        Commands::Status { runs } => commands::status::execute(db, config, *runs, json),
        Commands::State { command } => commands::state::execute(command, db, json),
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
