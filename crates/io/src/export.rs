// CSV export of the mapping table

use std::collections::HashMap;
use std::io::Write;

use firmlink_recon::model::{MappingRow, RegistrySnapshot};
use firmlink_recon::ReconError;

/// CSV header for the mapping export.
pub const MAPPING_HEADER: &[&str] = &["local_id", "local_name", "external_id", "crm_name"];

fn csv_err(e: csv::Error) -> ReconError {
    ReconError::Io(format!("CSV write error: {e}"))
}

/// Write mapping rows joined with both registries' names.
///
/// Rows are sorted by local id. Unmatched rows carry empty external columns;
/// ids no longer present in a registry carry an empty name.
pub fn write_mapping_csv(
    rows: &[MappingRow],
    snapshot: &RegistrySnapshot,
    writer: impl Write,
) -> Result<(), ReconError> {
    let local_names: HashMap<&str, &str> = snapshot
        .local_firms
        .iter()
        .map(|f| {
            let name = f.name.as_deref().or(f.short_code.as_deref()).unwrap_or("");
            (f.id.as_str(), name)
        })
        .collect();
    let crm_names: HashMap<&str, &str> = snapshot
        .crm_accounts
        .iter()
        .map(|a| (a.id.as_str(), a.name.as_deref().unwrap_or("")))
        .collect();

    let mut sorted: Vec<&MappingRow> = rows.iter().collect();
    sorted.sort();

    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv.write_record(MAPPING_HEADER).map_err(csv_err)?;

    for row in sorted {
        let external = row.external_id.as_deref().unwrap_or("");
        csv.write_record([
            row.local_id.as_str(),
            local_names.get(row.local_id.as_str()).copied().unwrap_or(""),
            external,
            crm_names.get(external).copied().unwrap_or(""),
        ])
        .map_err(csv_err)?;
    }

    csv.flush()
        .map_err(|e| ReconError::Io(format!("CSV flush error: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use firmlink_recon::model::{CrmAccount, LocalFirm};

    #[test]
    fn joins_names_and_sorts() {
        let snapshot = RegistrySnapshot::new(
            vec![
                LocalFirm {
                    id: "A1".into(),
                    name: Some("Acme GmbH".into()),
                    short_code: None,
                    postal_code: None,
                    street: None,
                },
                LocalFirm {
                    id: "A2".into(),
                    name: None,
                    short_code: Some("GLX".into()),
                    postal_code: None,
                    street: None,
                },
            ],
            vec![CrmAccount {
                id: "Z1".into(),
                name: Some("ACME, Inc.".into()),
                postal_code: None,
                street: None,
            }],
        );
        let rows = vec![
            MappingRow {
                local_id: "A2".into(),
                external_id: None,
            },
            MappingRow {
                local_id: "A1".into(),
                external_id: Some("Z1".into()),
            },
        ];

        let mut out = Vec::new();
        write_mapping_csv(&rows, &snapshot, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "local_id,local_name,external_id,crm_name\n\
             A1,Acme GmbH,Z1,\"ACME, Inc.\"\n\
             A2,GLX,,\n"
        );
    }
}
