use serde::Serialize;

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

/// One firm from the operational system (Registry A).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFirm {
    pub id: String,
    pub name: Option<String>,
    /// Short code / abbreviation; name fallback for name matching.
    pub short_code: Option<String>,
    pub postal_code: Option<String>,
    /// Free-text street line, usually with the house number embedded.
    pub street: Option<String>,
}

/// One CRM account (Registry B).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmAccount {
    pub id: String,
    pub name: Option<String>,
    pub postal_code: Option<String>,
    pub street: Option<String>,
}

/// Both registries, materialized once per run and shared read-only by every
/// strategy.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub local_firms: Vec<LocalFirm>,
    pub crm_accounts: Vec<CrmAccount>,
}

impl RegistrySnapshot {
    /// Build a snapshot, trimming the descriptive text fields. Blank values
    /// become `None`. Ids are primary keys and are kept verbatim.
    pub fn new(local_firms: Vec<LocalFirm>, crm_accounts: Vec<CrmAccount>) -> Self {
        let local_firms = local_firms
            .into_iter()
            .map(|f| LocalFirm {
                id: f.id,
                name: trimmed(f.name),
                short_code: trimmed(f.short_code),
                postal_code: trimmed(f.postal_code),
                street: trimmed(f.street),
            })
            .collect();
        let crm_accounts = crm_accounts
            .into_iter()
            .map(|a| CrmAccount {
                id: a.id,
                name: trimmed(a.name),
                postal_code: trimmed(a.postal_code),
                street: trimmed(a.street),
            })
            .collect();
        Self {
            local_firms,
            crm_accounts,
        }
    }

    pub fn local_ids(&self) -> Vec<String> {
        self.local_firms.iter().map(|f| f.id.clone()).collect()
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// One row of the mapping table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MappingRow {
    pub local_id: String,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBasis {
    ExactName,
    SimilarName,
    Address,
}

impl std::fmt::Display for MatchBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactName => write!(f, "exact_name"),
            Self::SimilarName => write!(f, "similar_name"),
            Self::Address => write!(f, "address"),
        }
    }
}

/// A proposed correspondence, consumed by the merge step right after the
/// strategy that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchProposal {
    pub local_id: String,
    pub external_id: String,
    pub score: f64,
    pub basis: MatchBasis,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingSummary {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Percentage of matched rows, 0.0 for an empty table.
    pub match_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyOutcome {
    pub name: String,
    pub description: String,
    pub proposals: usize,
    pub merged: usize,
    pub matched_after: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub target_table: String,
    pub engine_version: String,
    pub run_at: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub meta: RunMeta,
    /// Rows created by the EnsureMappingRows pass before the strategies.
    pub inserted_before: usize,
    /// Rows created by the EnsureMappingRows pass after the strategies.
    pub inserted_after: usize,
    pub strategies: Vec<StrategyOutcome>,
    pub summary: MappingSummary,
}
