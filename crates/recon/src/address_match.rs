use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, info};

use crate::address::{parse, AddressParser, NormalizedAddress, StreetLineParser};
use crate::config::AddressMatchConfig;
use crate::error::ReconError;
use crate::matcher::{pick_best, Candidate, MatchStrategy};
use crate::model::{MatchBasis, MatchProposal, RegistrySnapshot};
use crate::normalize::normalize;
use crate::similarity::{contains_either, similarity};

/// Match on postal address (road, postal code, house number), ranked by name
/// similarity.
pub struct AddressMatch {
    threshold: f64,
    country: String,
    parser: Box<dyn AddressParser>,
}

impl AddressMatch {
    pub const NAME: &'static str = "address_match";

    pub fn new(config: &AddressMatchConfig) -> Self {
        Self::with_parser(config, Box::new(StreetLineParser))
    }

    pub fn with_parser(config: &AddressMatchConfig, parser: Box<dyn AddressParser>) -> Self {
        Self {
            threshold: config.threshold,
            country: config.country.clone(),
            parser,
        }
    }

    fn entry<'a>(
        &self,
        id: &'a str,
        name: Option<&str>,
        postal_code: Option<&str>,
        street: Option<&str>,
    ) -> Result<Option<AddressEntry<'a>>, ReconError> {
        // Records missing any required field sit out this strategy entirely.
        let (Some(name), Some(postal_code), Some(street)) = (name, postal_code, street) else {
            return Ok(None);
        };
        // An empty name key would accept any candidate at the same address.
        let name_key = normalize(name);
        if name_key.is_empty() {
            return Ok(None);
        }
        let address = parse(self.parser.as_ref(), street, postal_code, &self.country)?;
        Ok(Some(AddressEntry {
            id,
            name_key,
            address,
        }))
    }
}

#[derive(Debug)]
struct AddressEntry<'a> {
    id: &'a str,
    name_key: String,
    address: NormalizedAddress,
}

impl AddressEntry<'_> {
    fn join_key(&self) -> Option<(&str, &str)> {
        Some((
            self.address.road.as_deref()?,
            self.address.postal_code.as_deref()?,
        ))
    }
}

impl MatchStrategy for AddressMatch {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Match firms by address (road, postcode, house number)"
    }

    fn propose(
        &self,
        snapshot: &RegistrySnapshot,
        unmatched: &BTreeSet<String>,
    ) -> Result<Vec<MatchProposal>, ReconError> {
        let mut seen = HashSet::new();
        let mut locals = Vec::new();
        for firm in &snapshot.local_firms {
            if !unmatched.contains(&firm.id) || !seen.insert(firm.id.as_str()) {
                continue;
            }
            if let Some(entry) = self.entry(
                &firm.id,
                firm.name.as_deref(),
                firm.postal_code.as_deref(),
                firm.street.as_deref(),
            )? {
                locals.push(entry);
            }
        }

        if locals.is_empty() {
            info!("no unmatched firms with a complete address");
            return Ok(Vec::new());
        }
        info!(candidates = locals.len(), "processing unmatched firms by address");

        let mut accounts = Vec::new();
        for account in &snapshot.crm_accounts {
            if let Some(entry) = self.entry(
                &account.id,
                account.name.as_deref(),
                account.postal_code.as_deref(),
                account.street.as_deref(),
            )? {
                accounts.push(entry);
            }
        }

        let mut by_location: HashMap<(&str, &str), Vec<&AddressEntry>> = HashMap::new();
        for account in &accounts {
            if let Some(key) = account.join_key() {
                by_location.entry(key).or_default().push(account);
            }
        }

        let mut proposals = Vec::new();
        for local in &locals {
            let Some(bucket) = local.join_key().and_then(|key| by_location.get(&key)) else {
                continue;
            };

            let candidates = bucket
                .iter()
                .filter(|account| local.address.same_location(&account.address))
                .filter_map(|account| {
                    let score = similarity(&local.name_key, &account.name_key);
                    let accepted = score > self.threshold
                        || contains_either(&local.name_key, &account.name_key);
                    accepted.then_some(Candidate {
                        external_id: account.id,
                        score,
                        basis: MatchBasis::Address,
                    })
                });

            if let Some(best) = pick_best(candidates) {
                debug!(
                    local_id = local.id,
                    external_id = best.external_id,
                    score = best.score,
                    "address candidate"
                );
                proposals.push(best.into_proposal(local.id));
            }
        }

        Ok(proposals)
    }
}
