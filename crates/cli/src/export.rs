//! `firmlink export`: mapping table as CSV.

use std::path::PathBuf;

use firmlink_io::export::write_mapping_csv;
use firmlink_recon::{MappingStore, RegistrySource};

use crate::run::{load_config, open_database};
use crate::{CliError, SourceArgs};

pub fn cmd_export(source: SourceArgs, output: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(&source)?;
    let db = open_database(&config)?;
    let rows = db.existing_mapping(&config.mapping.table)?.rows()?;
    let snapshot = db.registry(&config.registries)?.snapshot()?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .map_err(|e| CliError::io(format!("cannot create {}: {e}", path.display())))?;
            write_mapping_csv(&rows, &snapshot, std::io::BufWriter::new(file))?;
            eprintln!("wrote {} row(s) to {}", rows.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            write_mapping_csv(&rows, &snapshot, stdout.lock())?;
        }
    }
    Ok(())
}
