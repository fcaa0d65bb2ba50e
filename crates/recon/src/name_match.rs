use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use crate::config::NameMatchConfig;
use crate::error::ReconError;
use crate::matcher::{pick_best, Candidate, MatchStrategy};
use crate::model::{LocalFirm, MatchBasis, MatchProposal, RegistrySnapshot};
use crate::normalize::{normalize, normalize_opt};
use crate::similarity::similarity;

/// Match on cleaned names: equal keys, or Jaro-Winkler above the threshold.
#[derive(Debug, Clone)]
pub struct NameMatch {
    threshold: f64,
}

impl NameMatch {
    pub const NAME: &'static str = "name_match";

    pub fn new(config: &NameMatchConfig) -> Self {
        Self {
            threshold: config.threshold,
        }
    }
}

/// Registry-A comparison key; falls back to the short code when the name is blank.
pub fn local_name_key(firm: &LocalFirm) -> String {
    normalize_opt(firm.name.as_deref().or(firm.short_code.as_deref()))
}

impl MatchStrategy for NameMatch {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Match firms by name using cleaned names and Jaro-Winkler similarity"
    }

    fn propose(
        &self,
        snapshot: &RegistrySnapshot,
        unmatched: &BTreeSet<String>,
    ) -> Result<Vec<MatchProposal>, ReconError> {
        let accounts: Vec<(&str, String)> = snapshot
            .crm_accounts
            .iter()
            .filter_map(|a| {
                let key = a.name.as_deref().map(normalize).unwrap_or_default();
                (!key.is_empty()).then_some((a.id.as_str(), key))
            })
            .collect();

        let mut seen = HashSet::new();
        let mut proposals = Vec::new();

        for firm in &snapshot.local_firms {
            if !unmatched.contains(&firm.id) || !seen.insert(firm.id.as_str()) {
                continue;
            }
            let key = local_name_key(firm);
            if key.is_empty() {
                continue;
            }

            let candidates = accounts.iter().filter_map(|(external_id, account_key)| {
                if *account_key == key {
                    return Some(Candidate {
                        external_id,
                        score: 1.0,
                        basis: MatchBasis::ExactName,
                    });
                }
                let score = similarity(&key, account_key);
                (score > self.threshold).then_some(Candidate {
                    external_id,
                    score,
                    basis: MatchBasis::SimilarName,
                })
            });

            if let Some(best) = pick_best(candidates) {
                debug!(
                    local_id = %firm.id,
                    external_id = best.external_id,
                    score = best.score,
                    "name candidate"
                );
                proposals.push(best.into_proposal(&firm.id));
            }
        }

        Ok(proposals)
    }
}
