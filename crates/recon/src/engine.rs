use std::collections::HashSet;

use tracing::{error, info, warn};

use crate::config::StrategySelection;
use crate::error::ReconError;
use crate::matcher::MatchStrategy;
use crate::model::{RegistrySnapshot, RunMeta, RunReport, StrategyOutcome};
use crate::store::{MappingStore, RegistrySource};

/// Runs the selected strategies in registration order against one registry
/// snapshot, merging each strategy's proposals before the next one starts.
pub struct Orchestrator {
    strategies: Vec<Box<dyn MatchStrategy>>,
    dry_run: bool,
}

impl Orchestrator {
    /// Keep the registered strategies the selection asks for, in registration
    /// order. Duplicate registrations and unknown names are rejected.
    pub fn new(
        registry: Vec<Box<dyn MatchStrategy>>,
        selection: &StrategySelection,
    ) -> Result<Self, ReconError> {
        let mut names = HashSet::new();
        for strategy in &registry {
            if !names.insert(strategy.name().to_string()) {
                return Err(ReconError::ConfigValidation(format!(
                    "strategy '{}' registered twice",
                    strategy.name()
                )));
            }
        }

        let strategies = match &selection.enabled {
            None => registry
                .into_iter()
                .filter(|s| s.enabled_by_default())
                .collect(),
            Some(enabled) => {
                if let Some(unknown) = enabled.iter().find(|n| !names.contains(n.as_str())) {
                    return Err(ReconError::UnknownStrategy(unknown.clone()));
                }
                registry
                    .into_iter()
                    .filter(|s| enabled.iter().any(|n| n == s.name()))
                    .collect()
            }
        };

        Ok(Self {
            strategies,
            dry_run: false,
        })
    }

    /// Mark reports as dry runs. The caller chooses a throwaway store.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn strategies(&self) -> impl Iterator<Item = &dyn MatchStrategy> {
        self.strategies.iter().map(|s| s.as_ref())
    }

    /// Materialize the registries once, then run every strategy.
    pub fn run(
        &self,
        source: &dyn RegistrySource,
        store: &mut dyn MappingStore,
    ) -> Result<RunReport, ReconError> {
        let snapshot = source.snapshot()?;
        info!(
            local_firms = snapshot.local_firms.len(),
            crm_accounts = snapshot.crm_accounts.len(),
            "loaded registry snapshot"
        );
        self.run_snapshot(&snapshot, store)
    }

    pub fn run_snapshot(
        &self,
        snapshot: &RegistrySnapshot,
        store: &mut dyn MappingStore,
    ) -> Result<RunReport, ReconError> {
        let meta = RunMeta {
            target_table: store.target().to_string(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            dry_run: self.dry_run,
        };

        if self.strategies.is_empty() {
            warn!(
                target_table = %meta.target_table,
                "no matching strategies enabled, mapping table left unchanged"
            );
            return Ok(RunReport {
                meta,
                inserted_before: 0,
                inserted_after: 0,
                strategies: Vec::new(),
                summary: store.summary()?,
            });
        }

        let local_ids = snapshot.local_ids();
        let inserted_before = store.ensure_rows(&local_ids)?;
        info!(
            inserted = inserted_before,
            target_table = %meta.target_table,
            "ensured mapping rows"
        );

        let total = self.strategies.len();
        let mut outcomes = Vec::with_capacity(total);
        for (i, strategy) in self.strategies.iter().enumerate() {
            info!(
                step = i + 1,
                of = total,
                strategy = strategy.name(),
                "{}",
                strategy.description()
            );
            let outcome = run_strategy(strategy.as_ref(), snapshot, store).map_err(|e| {
                error!(strategy = strategy.name(), error = %e, "strategy failed");
                ReconError::Strategy {
                    name: strategy.name().to_string(),
                    source: Box::new(e),
                }
            })?;
            outcomes.push(outcome);
        }

        let inserted_after = store.ensure_rows(&local_ids)?;
        let summary = store.summary()?;
        info!(
            total = summary.total,
            matched = summary.matched,
            unmatched = summary.unmatched,
            "matching finished"
        );

        Ok(RunReport {
            meta,
            inserted_before,
            inserted_after,
            strategies: outcomes,
            summary,
        })
    }
}

fn run_strategy(
    strategy: &dyn MatchStrategy,
    snapshot: &RegistrySnapshot,
    store: &mut dyn MappingStore,
) -> Result<StrategyOutcome, ReconError> {
    // Re-read: earlier strategies in this run may have matched rows.
    let unmatched = store.unmatched_ids()?;
    let proposals = strategy.propose(snapshot, &unmatched)?;
    let merged = store.merge(&proposals)?;
    let matched_after = store.summary()?.matched;
    info!(
        strategy = strategy.name(),
        proposals = proposals.len(),
        merged,
        matched_after,
        "merged proposals"
    );

    Ok(StrategyOutcome {
        name: strategy.name().to_string(),
        description: strategy.description().to_string(),
        proposals: proposals.len(),
        merged,
        matched_after,
    })
}
