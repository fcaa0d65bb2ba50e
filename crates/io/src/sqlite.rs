// Registries and mapping table backed by SQLite

use std::collections::BTreeSet;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Row};
use tracing::{debug, info};

use firmlink_recon::config::{quote_identifier, RegistriesConfig};
use firmlink_recon::evidence::summary_from_counts;
use firmlink_recon::model::{CrmAccount, LocalFirm, MappingRow, MappingSummary, MatchProposal};
use firmlink_recon::store::{MappingStore, MemoryStore, RegistrySource};
use firmlink_recon::ReconError;

fn store_err(e: rusqlite::Error) -> ReconError {
    ReconError::Store(e.to_string())
}

/// Read any SQLite value as text. Integer ids and postal codes come back as
/// their decimal form.
fn text_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    })
}

/// Scoped database handle. The connection closes on drop.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, ReconError> {
        let conn = Connection::open(path).map_err(store_err)?;
        debug!(path = %path.display(), "opened database");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, ReconError> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// True if `name` (optionally `schema.table`) names a table or view.
    pub fn table_exists(&self, name: &str) -> Result<bool, ReconError> {
        quote_identifier(name)?;
        let (schema, table) = match name.split_once('.') {
            Some((schema, table)) => (schema, table),
            None => ("main", name),
        };
        let sql = format!(
            "SELECT COUNT(*) FROM \"{schema}\".sqlite_master WHERE type IN ('table', 'view') AND name = ?1"
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params![table], |r| r.get(0))
            .map_err(store_err)?;
        Ok(count > 0)
    }

    /// Registry reader over the configured tables. Fails before any query if
    /// an identifier is rejected or a table is missing.
    pub fn registry(&self, config: &RegistriesConfig) -> Result<SqliteRegistry<'_>, ReconError> {
        for table in [&config.local.table, &config.crm.table] {
            if !self.table_exists(table)? {
                return Err(ReconError::UnknownTable(table.clone()));
            }
        }

        let local = &config.local.columns;
        let local_sql = format!(
            "SELECT {}, {}, {}, {}, {} FROM {}",
            quote_identifier(&local.id)?,
            quote_identifier(&local.name)?,
            quote_identifier(&local.short_code)?,
            quote_identifier(&local.postal_code)?,
            quote_identifier(&local.street)?,
            quote_identifier(&config.local.table)?,
        );

        let crm = &config.crm.columns;
        let crm_sql = format!(
            "SELECT {}, {}, {}, {} FROM {}",
            quote_identifier(&crm.id)?,
            quote_identifier(&crm.name)?,
            quote_identifier(&crm.postal_code)?,
            quote_identifier(&crm.street)?,
            quote_identifier(&config.crm.table)?,
        );

        Ok(SqliteRegistry {
            conn: &self.conn,
            local_sql,
            crm_sql,
        })
    }

    /// Mapping store on `table`, created if absent.
    pub fn mapping(&self, table: &str) -> Result<SqliteMappingStore<'_>, ReconError> {
        let quoted = quote_identifier(table)?;
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {quoted} (
                    local_id TEXT NOT NULL PRIMARY KEY,
                    external_id TEXT
                )"
            ))
            .map_err(store_err)?;
        Ok(SqliteMappingStore {
            conn: &self.conn,
            table: table.to_string(),
            quoted,
        })
    }

    /// Mapping store on an existing table. Missing tables are an error.
    pub fn existing_mapping(&self, table: &str) -> Result<SqliteMappingStore<'_>, ReconError> {
        if !self.table_exists(table)? {
            return Err(ReconError::UnknownTable(table.to_string()));
        }
        self.mapping(table)
    }

    /// Copy the current mapping rows into memory for a dry run. A missing
    /// table gives an empty store and is not created.
    pub fn memory_copy(&self, table: &str) -> Result<MemoryStore, ReconError> {
        if !self.table_exists(table)? {
            return Ok(MemoryStore::new(table));
        }
        let rows = self.mapping(table)?.rows()?;
        Ok(MemoryStore::from_rows(table, rows))
    }
}

/// Reads both registries with the configured column mapping.
pub struct SqliteRegistry<'a> {
    conn: &'a Connection,
    local_sql: String,
    crm_sql: String,
}

impl SqliteRegistry<'_> {
    fn query<T>(
        &self,
        sql: &str,
        map: impl Fn(&Row<'_>) -> rusqlite::Result<Option<T>>,
    ) -> Result<Vec<T>, ReconError> {
        let mut stmt = self.conn.prepare(sql).map_err(store_err)?;
        let rows = stmt.query_map([], |r| map(r)).map_err(store_err)?;
        let mut out = Vec::new();
        for row in rows {
            if let Some(record) = row.map_err(store_err)? {
                out.push(record);
            }
        }
        Ok(out)
    }
}

impl RegistrySource for SqliteRegistry<'_> {
    fn load_local_firms(&self) -> Result<Vec<LocalFirm>, ReconError> {
        // Rows without an id cannot be mapped and are skipped.
        let firms = self.query(&self.local_sql, |r| {
            let Some(id) = text_at(r, 0)? else {
                return Ok(None);
            };
            Ok(Some(LocalFirm {
                id,
                name: text_at(r, 1)?,
                short_code: text_at(r, 2)?,
                postal_code: text_at(r, 3)?,
                street: text_at(r, 4)?,
            }))
        })?;
        info!(count = firms.len(), "loaded local firms");
        Ok(firms)
    }

    fn load_crm_accounts(&self) -> Result<Vec<CrmAccount>, ReconError> {
        let accounts = self.query(&self.crm_sql, |r| {
            let Some(id) = text_at(r, 0)? else {
                return Ok(None);
            };
            Ok(Some(CrmAccount {
                id,
                name: text_at(r, 1)?,
                postal_code: text_at(r, 2)?,
                street: text_at(r, 3)?,
            }))
        })?;
        info!(count = accounts.len(), "loaded CRM accounts");
        Ok(accounts)
    }
}

/// The persistent mapping table. Every write runs in its own transaction.
pub struct SqliteMappingStore<'a> {
    conn: &'a Connection,
    table: String,
    quoted: String,
}

impl MappingStore for SqliteMappingStore<'_> {
    fn target(&self) -> &str {
        &self.table
    }

    fn ensure_rows(&mut self, local_ids: &[String]) -> Result<usize, ReconError> {
        let q = &self.quoted;
        let tx = self.conn.unchecked_transaction().map_err(store_err)?;
        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO {q} (local_id, external_id)
                     SELECT ?1, NULL WHERE NOT EXISTS (SELECT 1 FROM {q} WHERE local_id = ?1)"
                ))
                .map_err(store_err)?;
            for id in local_ids {
                inserted += stmt.execute(params![id]).map_err(store_err)?;
            }
        }
        tx.commit().map_err(store_err)?;
        Ok(inserted)
    }

    fn unmatched_ids(&self) -> Result<BTreeSet<String>, ReconError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT local_id FROM {} WHERE external_id IS NULL",
                self.quoted
            ))
            .map_err(store_err)?;
        let rows = stmt.query_map([], |r| text_at(r, 0)).map_err(store_err)?;
        let mut ids = BTreeSet::new();
        for id in rows {
            if let Some(id) = id.map_err(store_err)? {
                ids.insert(id);
            }
        }
        Ok(ids)
    }

    fn merge(&mut self, proposals: &[MatchProposal]) -> Result<usize, ReconError> {
        if proposals.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.unchecked_transaction().map_err(store_err)?;
        tx.execute_batch(
            "DROP TABLE IF EXISTS temp.match_proposals;
             CREATE TEMP TABLE match_proposals (
                 proposed_local_id TEXT NOT NULL PRIMARY KEY,
                 proposed_external_id TEXT NOT NULL
             );",
        )
        .map_err(store_err)?;
        {
            // First proposal per local id wins.
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO temp.match_proposals
                     (proposed_local_id, proposed_external_id) VALUES (?1, ?2)",
                )
                .map_err(store_err)?;
            for p in proposals {
                stmt.execute(params![p.local_id, p.external_id])
                    .map_err(store_err)?;
            }
        }
        let updated = tx
            .execute(
                &format!(
                    "UPDATE {} SET external_id = p.proposed_external_id
                     FROM temp.match_proposals AS p
                     WHERE local_id = p.proposed_local_id AND external_id IS NULL",
                    self.quoted
                ),
                [],
            )
            .map_err(store_err)?;
        tx.execute_batch("DROP TABLE temp.match_proposals;")
            .map_err(store_err)?;
        tx.commit().map_err(store_err)?;
        Ok(updated)
    }

    fn summary(&self) -> Result<MappingSummary, ReconError> {
        let (total, matched): (i64, i64) = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*), COUNT(external_id) FROM {}", self.quoted),
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .map_err(store_err)?;
        Ok(summary_from_counts(total as usize, matched as usize))
    }

    fn rows(&self) -> Result<Vec<MappingRow>, ReconError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT local_id, external_id FROM {} ORDER BY local_id",
                self.quoted
            ))
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], |r| Ok((text_at(r, 0)?, text_at(r, 1)?)))
            .map_err(store_err)?;
        let mut out = Vec::new();
        for row in rows {
            if let (Some(local_id), external_id) = row.map_err(store_err)? {
                out.push(MappingRow {
                    local_id,
                    external_id,
                });
            }
        }
        Ok(out)
    }
}
