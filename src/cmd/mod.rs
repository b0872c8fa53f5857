mod anonymize;
mod inspect;

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use dump_anonymizer::logging::init_logging;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dump-anonymizer")]
#[command(author = "Helge Sverre <helge.sverre@gmail.com>")]
#[command(version)]
#[command(about = "Anonymize MySQL dumps while keeping foreign keys consistent", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Anonymize columns of a MySQL dump, propagating changes along foreign keys
    Anonymize {
        /// Input SQL dump, or - for stdin
        /// Supports .gz, .bz2, .xz, .zst compression
        file: PathBuf,

        /// Change request file (JSON, or YAML by .yaml/.yml extension)
        #[arg(short, long)]
        config: PathBuf,

        /// Output SQL file, or - for stdout
        #[arg(short, long, default_value = "anon_dump.sql")]
        output: PathBuf,

        /// Random seed for reproducible output (overrides the config file)
        #[arg(long)]
        seed: Option<u64>,

        /// Follow chains of foreign keys instead of a single hop
        #[arg(long)]
        transitive: bool,

        /// Run the whole pipeline without writing output
        #[arg(long)]
        dry_run: bool,

        /// Only check the config against the dump's schema
        #[arg(long)]
        validate_only: bool,

        /// Output statistics as JSON
        #[arg(long)]
        json: bool,

        /// Show progress over table rules
        #[arg(short, long)]
        progress: bool,
    },

    /// Show the schema, foreign keys and row counts extracted from a dump
    Inspect {
        /// Input SQL dump, or - for stdin
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    if !matches!(cli.command, Commands::Completions { .. }) {
        init_logging(cli.verbose, cli.quiet)?;
    }

    match cli.command {
        Commands::Anonymize {
            file,
            config,
            output,
            seed,
            transitive,
            dry_run,
            validate_only,
            json,
            progress,
        } => anonymize::run(
            file,
            config,
            output,
            seed,
            transitive,
            dry_run,
            validate_only,
            json,
            progress,
        ),
        Commands::Inspect { file, json } => inspect::run(file, json),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "dump-anonymizer",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}
