//! Seams to the tabular data source and the mapping table.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ReconError;
use crate::evidence::compute_summary;
use crate::model::{
    CrmAccount, LocalFirm, MappingRow, MappingSummary, MatchProposal, RegistrySnapshot,
};

/// Read-only access to both registries.
pub trait RegistrySource {
    fn load_local_firms(&self) -> Result<Vec<LocalFirm>, ReconError>;
    fn load_crm_accounts(&self) -> Result<Vec<CrmAccount>, ReconError>;

    /// Materialize both registries once, descriptive fields trimmed.
    fn snapshot(&self) -> Result<RegistrySnapshot, ReconError> {
        Ok(RegistrySnapshot::new(
            self.load_local_firms()?,
            self.load_crm_accounts()?,
        ))
    }
}

impl RegistrySource for RegistrySnapshot {
    fn load_local_firms(&self) -> Result<Vec<LocalFirm>, ReconError> {
        Ok(self.local_firms.clone())
    }

    fn load_crm_accounts(&self) -> Result<Vec<CrmAccount>, ReconError> {
        Ok(self.crm_accounts.clone())
    }
}

/// The mapping table: one row per Registry-A id, `external_id` null until
/// some strategy matches it.
pub trait MappingStore {
    /// Name of the backing relation, for reporting.
    fn target(&self) -> &str;

    /// Insert a row with a null `external_id` for every id not yet present.
    /// Returns the number of rows inserted.
    fn ensure_rows(&mut self, local_ids: &[String]) -> Result<usize, ReconError>;

    /// Ids whose `external_id` is null.
    fn unmatched_ids(&self) -> Result<BTreeSet<String>, ReconError>;

    /// Apply proposals to rows whose `external_id` is still null, atomically.
    /// Existing matches are never overwritten. Returns the rows updated.
    fn merge(&mut self, proposals: &[MatchProposal]) -> Result<usize, ReconError>;

    fn summary(&self) -> Result<MappingSummary, ReconError>;

    /// All rows, ordered by `local_id`.
    fn rows(&self) -> Result<Vec<MappingRow>, ReconError>;
}

/// Mapping table held in memory. Backs dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    target: String,
    rows: BTreeMap<String, Option<String>>,
}

impl MemoryStore {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            rows: BTreeMap::new(),
        }
    }

    /// Seed from existing rows, e.g. a copy of a persistent mapping table.
    pub fn from_rows(target: impl Into<String>, rows: Vec<MappingRow>) -> Self {
        Self {
            target: target.into(),
            rows: rows
                .into_iter()
                .map(|r| (r.local_id, r.external_id))
                .collect(),
        }
    }

    pub fn external_id(&self, local_id: &str) -> Option<&str> {
        self.rows.get(local_id).and_then(|e| e.as_deref())
    }
}

impl MappingStore for MemoryStore {
    fn target(&self) -> &str {
        &self.target
    }

    fn ensure_rows(&mut self, local_ids: &[String]) -> Result<usize, ReconError> {
        let mut inserted = 0;
        for id in local_ids {
            if !self.rows.contains_key(id) {
                self.rows.insert(id.clone(), None);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn unmatched_ids(&self) -> Result<BTreeSet<String>, ReconError> {
        Ok(self
            .rows
            .iter()
            .filter(|(_, external)| external.is_none())
            .map(|(local, _)| local.clone())
            .collect())
    }

    fn merge(&mut self, proposals: &[MatchProposal]) -> Result<usize, ReconError> {
        let mut updated = 0;
        for proposal in proposals {
            if let Some(slot) = self.rows.get_mut(&proposal.local_id) {
                if slot.is_none() {
                    *slot = Some(proposal.external_id.clone());
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    fn summary(&self) -> Result<MappingSummary, ReconError> {
        Ok(compute_summary(&self.rows()?))
    }

    fn rows(&self) -> Result<Vec<MappingRow>, ReconError> {
        Ok(self
            .rows
            .iter()
            .map(|(local, external)| MappingRow {
                local_id: local.clone(),
                external_id: external.clone(),
            })
            .collect())
    }
}
