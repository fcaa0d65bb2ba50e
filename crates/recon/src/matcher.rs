use std::cmp::Reverse;
use std::collections::BTreeSet;

use ordered_float::OrderedFloat;

use crate::address_match::AddressMatch;
use crate::config::MatchConfig;
use crate::error::ReconError;
use crate::model::{MatchBasis, MatchProposal, RegistrySnapshot};
use crate::name_match::NameMatch;

/// One matching algorithm. Given the shared snapshot and the Registry-A ids
/// still unmatched, proposes at most one Registry-B id per unmatched record.
pub trait MatchStrategy {
    /// Stable identifier used in strategy selections and reports.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn enabled_by_default(&self) -> bool {
        true
    }

    fn propose(
        &self,
        snapshot: &RegistrySnapshot,
        unmatched: &BTreeSet<String>,
    ) -> Result<Vec<MatchProposal>, ReconError>;
}

/// The built-in strategies in run order: name first, then address.
pub fn default_strategies(config: &MatchConfig) -> Vec<Box<dyn MatchStrategy>> {
    vec![
        Box::new(NameMatch::new(&config.name_match)),
        Box::new(AddressMatch::new(&config.address_match)),
    ]
}

/// A scored Registry-B candidate for one Registry-A record.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    pub external_id: &'a str,
    pub score: f64,
    pub basis: MatchBasis,
}

/// Highest score wins; equal scores go to the lowest external id so repeated
/// runs pick the same candidate.
pub fn pick_best<'a, I>(candidates: I) -> Option<Candidate<'a>>
where
    I: IntoIterator<Item = Candidate<'a>>,
{
    candidates
        .into_iter()
        .max_by_key(|c| (OrderedFloat(c.score), Reverse(c.external_id)))
}

impl Candidate<'_> {
    pub fn into_proposal(self, local_id: &str) -> MatchProposal {
        MatchProposal {
            local_id: local_id.to_string(),
            external_id: self.external_id.to_string(),
            score: self.score,
            basis: self.basis,
        }
    }
}
