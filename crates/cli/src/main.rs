// firmlink CLI - match local firms against CRM accounts

mod exit_codes;
mod export;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::*;
use firmlink_recon::ReconError;

#[derive(Parser)]
#[command(name = "firmlink")]
#[command(about = "Match local firms against CRM accounts and maintain the mapping table")]
#[command(version)]
struct Cli {
    /// Log per-record decisions (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the registries and the mapping table live.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Path to the TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// SQLite database (overrides `database` in the config)
    #[arg(long, env = "FIRMLINK_DB")]
    pub db: Option<PathBuf>,

    /// Mapping table name (overrides `[mapping] table`)
    #[arg(long, env = "FIRMLINK_TABLE")]
    pub table: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the matching pipeline and update the mapping table
    #[command(after_help = "\
Examples:
  firmlink run --config firmlink.toml
  firmlink run --db firms.db --strategies name_match
  firmlink run --config firmlink.toml --dry-run --json")]
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Comma-separated strategies to run, in registration order
        #[arg(long, env = "FIRMLINK_STRATEGIES")]
        strategies: Option<String>,

        /// Output the JSON run report to stdout instead of the human summary
        #[arg(long)]
        json: bool,

        /// Write the JSON run report to a file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Match against an in-memory copy; the database is not written
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate a config file without touching the database
    #[command(after_help = "\
Examples:
  firmlink validate --config firmlink.toml")]
    Validate {
        /// Path to the TOML config file
        #[arg(long)]
        config: PathBuf,
    },

    /// Print match statistics for the mapping table
    Summary {
        #[command(flatten)]
        source: SourceArgs,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// List registered strategies in run order
    Strategies {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the mapping table as CSV, joined with firm and account names
    #[command(after_help = "\
Examples:
  firmlink export --db firms.db -o mapping.csv")]
    Export {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            source,
            strategies,
            json,
            output,
            dry_run,
        } => run::cmd_run(source, strategies, json, output, dry_run),
        Commands::Validate { config } => run::cmd_validate(config),
        Commands::Summary { source, json } => run::cmd_summary(source, json),
        Commands::Strategies { json } => run::cmd_strategies(json),
        Commands::Export { source, output } => export::cmd_export(source, output),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError {
            code,
            message,
            hint,
        }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_USAGE,
            message: msg.into(),
            hint: None,
        }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_ERROR,
            message: msg.into(),
            hint: None,
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let code = match &err {
            e if e.is_config() => EXIT_INVALID_CONFIG,
            ReconError::Strategy { .. } | ReconError::AddressParse { .. } => EXIT_STRATEGY_FAILED,
            ReconError::Store(_) => EXIT_STORE,
            _ => EXIT_ERROR,
        };
        let hint = match &err {
            ReconError::UnknownStrategy(_) => {
                Some("run `firmlink strategies` to list registered strategies".to_string())
            }
            ReconError::UnknownTable(_) => {
                Some("check the table names in the config or --table".to_string())
            }
            ReconError::InvalidIdentifier(_) => Some(
                "identifiers must match [A-Za-z_][A-Za-z0-9_]*, optionally schema-qualified"
                    .to_string(),
            ),
            ReconError::Strategy { .. } => {
                Some("matches merged by earlier strategies were kept".to_string())
            }
            _ => None,
        };
        Self {
            code,
            message: err.to_string(),
            hint,
        }
    }
}
