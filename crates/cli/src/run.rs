//! `firmlink run`, `validate`, `summary` and `strategies`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use firmlink_io::Database;
use firmlink_recon::config::StrategySelection;
use firmlink_recon::evidence::format_summary;
use firmlink_recon::{default_strategies, MappingStore, MatchConfig, Orchestrator, RunReport};

use crate::{CliError, SourceArgs};

/// Load the config file (or defaults) and apply command-line overrides.
/// Relative `database` paths in the file resolve against the file's directory.
pub fn load_config(source: &SourceArgs) -> Result<MatchConfig, CliError> {
    let mut config = match &source.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                CliError::usage(format!("cannot read config {}: {e}", path.display()))
            })?;
            let mut config = MatchConfig::from_toml(&text)?;
            if let Some(db) = config.database.take() {
                let base = path.parent().unwrap_or_else(|| Path::new("."));
                config.database = Some(base.join(db).to_string_lossy().into_owned());
            }
            config
        }
        None => MatchConfig::default(),
    };

    if let Some(db) = &source.db {
        config.database = Some(db.to_string_lossy().into_owned());
    }
    if let Some(table) = &source.table {
        config.mapping.table = table.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Open the configured database. It must already exist: the registries are
/// loaded by external tools, never created here.
pub fn open_database(config: &MatchConfig) -> Result<Database, CliError> {
    let path = config.database.as_deref().ok_or_else(|| {
        CliError::usage("no database given")
            .with_hint("pass --db, set FIRMLINK_DB, or set `database` in the config")
    })?;
    let path = Path::new(path);
    if !path.exists() {
        return Err(CliError::usage(format!("database not found: {}", path.display())));
    }
    Ok(Database::open(path)?)
}

pub fn cmd_run(
    source: SourceArgs,
    strategies: Option<String>,
    json_output: bool,
    output_file: Option<PathBuf>,
    dry_run: bool,
) -> Result<(), CliError> {
    let mut config = load_config(&source)?;
    if let Some(list) = strategies {
        config.strategies = StrategySelection::from_list(&list);
    }

    let orchestrator =
        Orchestrator::new(default_strategies(&config), &config.strategies)?.dry_run(dry_run);
    let db = open_database(&config)?;
    let registry = db.registry(&config.registries)?;

    let report = if dry_run {
        info!(table = %config.mapping.table, "dry run: matching against an in-memory copy");
        let mut store = db.memory_copy(&config.mapping.table)?;
        orchestrator.run(&registry, &mut store)?
    } else {
        let mut store = db.mapping(&config.mapping.table)?;
        orchestrator.run(&registry, &mut store)?
    };

    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::io(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    if report.meta.dry_run {
        eprintln!("dry run: '{}' was not modified", report.meta.target_table);
    }
    for outcome in &report.strategies {
        eprintln!(
            "  {}: {} proposal(s), {} merged, {} matched after",
            outcome.name, outcome.proposals, outcome.merged, outcome.matched_after,
        );
    }
    eprintln!("{}", format_summary(&report.summary));
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&SourceArgs {
        config: Some(config_path),
        ..SourceArgs::default()
    })?;
    let orchestrator = Orchestrator::new(default_strategies(&config), &config.strategies)?;
    let names: Vec<&str> = orchestrator.strategies().map(|s| s.name()).collect();

    eprintln!(
        "valid: mapping table '{}', registries '{}' and '{}', strategies: {}",
        config.mapping.table,
        config.registries.local.table,
        config.registries.crm.table,
        if names.is_empty() { "(none)".to_string() } else { names.join(", ") },
    );
    Ok(())
}

pub fn cmd_summary(source: SourceArgs, json_output: bool) -> Result<(), CliError> {
    let config = load_config(&source)?;
    let db = open_database(&config)?;
    let summary = db.existing_mapping(&config.mapping.table)?.summary()?;

    if json_output {
        let json_str = serde_json::to_string_pretty(&summary)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    } else {
        println!("{}", format_summary(&summary));
    }
    Ok(())
}

#[derive(Serialize)]
struct StrategyInfo<'a> {
    name: &'a str,
    description: &'a str,
    enabled_by_default: bool,
}

pub fn cmd_strategies(json_output: bool) -> Result<(), CliError> {
    let strategies = default_strategies(&MatchConfig::default());
    let infos: Vec<StrategyInfo> = strategies
        .iter()
        .map(|s| StrategyInfo {
            name: s.name(),
            description: s.description(),
            enabled_by_default: s.enabled_by_default(),
        })
        .collect();

    if json_output {
        let json_str = serde_json::to_string_pretty(&infos)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    for (i, info) in infos.iter().enumerate() {
        println!(
            "{}. {:<14} {}{}",
            i + 1,
            info.name,
            info.description,
            if info.enabled_by_default { "" } else { " (opt-in)" },
        );
    }
    Ok(())
}
