//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::sync::DEFAULT_RECENT_RUNS;

pub mod commands;

/// Memento Mirror - incremental local mirror of a remote library API
#[derive(Parser, Debug)]
#[command(name = "mm", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.memento-mirror/data/mirror.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file path (default: ~/.memento-mirror/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and a starter config
    Init {
        /// Overwrite an existing database and config
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Mirror configured collections into the local database
    Sync(SyncArgs),

    /// Inspect one collection without writing anything
    Probe(ProbeArgs),

    /// List libraries visible to the API token
    Libraries,

    /// Show watermarks, row counts and recent runs
    Status {
        /// Number of recent runs to show
        #[arg(long, default_value_t = DEFAULT_RECENT_RUNS)]
        runs: usize,
    },

    /// Manage stored watermarks
    State {
        #[command(subcommand)]
        command: StateCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Collections to sync (default: all configured)
    pub collections: Vec<String>,

    /// Ignore watermarks and fetch everything
    #[arg(long)]
    pub full: bool,

    /// Page size for this run
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// Library identifier (configured or not)
    pub collection: String,

    /// Also test which since-filters the server honors
    #[arg(long)]
    pub capabilities: bool,

    /// Page size for the probe request
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// Delete a collection's watermark so the next sync is full
    Reset {
        /// Collection identifier
        collection: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_args_parse() {
        let cli = Cli::parse_from(["mm", "sync", "books", "films", "--full", "--limit", "20", "--json"]);
        assert!(cli.json);
        match cli.command {
            Commands::Sync(args) => {
                assert_eq!(args.collections, vec!["books", "films"]);
                assert!(args.full);
                assert_eq!(args.limit, Some(20));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["mm", "status", "--db", "/tmp/x.db", "-vv"]);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
        assert_eq!(cli.verbose, 2);
    }
}
