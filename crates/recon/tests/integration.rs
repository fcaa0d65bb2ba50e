use std::cell::RefCell;
use std::collections::BTreeSet;

use firmlink_recon::address_match::AddressMatch;
use firmlink_recon::config::{MatchConfig, StrategySelection};
use firmlink_recon::model::{CrmAccount, LocalFirm, MatchBasis, MatchProposal};
use firmlink_recon::name_match::NameMatch;
use firmlink_recon::{
    default_strategies, MappingStore, MatchStrategy, MemoryStore, Orchestrator, ReconError,
    RegistrySnapshot,
};

fn firm(id: &str, name: &str, plz: &str, street: &str) -> LocalFirm {
    LocalFirm {
        id: id.into(),
        name: Some(name.into()),
        short_code: None,
        postal_code: Some(plz.into()),
        street: Some(street.into()),
    }
}

fn account(id: &str, name: &str, plz: &str, street: &str) -> CrmAccount {
    CrmAccount {
        id: id.into(),
        name: Some(name.into()),
        postal_code: Some(plz.into()),
        street: Some(street.into()),
    }
}

fn registries() -> RegistrySnapshot {
    RegistrySnapshot::new(
        vec![
            firm("A1", "Acme GmbH", "10115", "Hauptstr. 5"),
            firm("A2", "Globex Handel", "20095", "Mönckebergstr. 62-64"),
            firm("A3", "Müller", "50667", "Domkloster 4"),
            firm("A4", "Initech", "80331", "Marienplatz 1"),
        ],
        vec![
            account("Z1", "ACME", "10115", "Hauptstrasse 5"),
            account("Z2", "Globex Handel", "20095", "Mönckebergstraße 62"),
            account("Z3", "Praxis Dr. Müller", "50667", "Domkloster 4"),
            account("Z4", "Umbrella", "80331", "Marienplatz 9"),
        ],
    )
}

fn orchestrator(selection: &StrategySelection) -> Orchestrator {
    let config = MatchConfig::default();
    Orchestrator::new(default_strategies(&config), selection).unwrap()
}

/// Proposes a fixed list and records the unmatched set it was given.
struct Scripted {
    name: &'static str,
    proposals: Vec<(&'static str, &'static str)>,
    fail: bool,
    seen_unmatched: RefCell<Vec<BTreeSet<String>>>,
}

impl Scripted {
    fn new(name: &'static str, proposals: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            name,
            proposals,
            fail: false,
            seen_unmatched: RefCell::new(Vec::new()),
        }
    }

    fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, Vec::new())
        }
    }
}

impl MatchStrategy for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "scripted proposals"
    }

    fn propose(
        &self,
        _snapshot: &RegistrySnapshot,
        unmatched: &BTreeSet<String>,
    ) -> Result<Vec<MatchProposal>, ReconError> {
        self.seen_unmatched.borrow_mut().push(unmatched.clone());
        if self.fail {
            return Err(ReconError::Store("no such column: Billing_Code".into()));
        }
        Ok(self
            .proposals
            .iter()
            .filter(|(local, _)| unmatched.contains(*local))
            .map(|(local, external)| MatchProposal {
                local_id: local.to_string(),
                external_id: external.to_string(),
                score: 1.0,
                basis: MatchBasis::ExactName,
            })
            .collect())
    }
}

// -------------------------------------------------------------------------
// Built-in strategies
// -------------------------------------------------------------------------

#[test]
fn full_run_matches_by_name_then_address() {
    let mut store = MemoryStore::new("firm_mapping");
    let report = orchestrator(&StrategySelection::default())
        .run(&registries(), &mut store)
        .unwrap();

    assert_eq!(report.inserted_before, 4);
    assert_eq!(report.inserted_after, 0);
    assert_eq!(store.external_id("A1"), Some("Z1"));
    assert_eq!(store.external_id("A2"), Some("Z2"));
    assert_eq!(store.external_id("A3"), Some("Z3"));
    assert_eq!(store.external_id("A4"), None);

    let names: Vec<&str> = report.strategies.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec![NameMatch::NAME, AddressMatch::NAME]);
    // Acme and Globex match on name; Müller only by address.
    assert_eq!(report.strategies[0].merged, 2);
    assert_eq!(report.strategies[1].merged, 1);
    assert_eq!(report.strategies[1].matched_after, 3);

    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.matched, 3);
    assert_eq!(report.summary.unmatched, 1);
    assert!((report.summary.match_rate - 75.0).abs() < 1e-9);
}

#[test]
fn address_only_run_joins_street_variants() {
    let mut store = MemoryStore::new("firm_mapping");
    orchestrator(&StrategySelection::only([AddressMatch::NAME]))
        .run(&registries(), &mut store)
        .unwrap();
    assert_eq!(store.external_id("A1"), Some("Z1"));
    assert_eq!(store.external_id("A4"), None);
}

#[test]
fn rerun_is_idempotent() {
    let mut store = MemoryStore::new("firm_mapping");
    let orch = orchestrator(&StrategySelection::default());
    orch.run(&registries(), &mut store).unwrap();
    let first = store.rows().unwrap();

    let again = orch.run(&registries(), &mut store).unwrap();
    assert_eq!(store.rows().unwrap(), first);
    assert_eq!(again.inserted_before, 0);
    assert!(again.strategies.iter().all(|s| s.merged == 0));
}

#[test]
fn new_firms_picked_up_on_next_run() {
    let mut store = MemoryStore::new("firm_mapping");
    let orch = orchestrator(&StrategySelection::default());
    orch.run(&registries(), &mut store).unwrap();

    let mut grown = registries();
    grown.local_firms.push(firm("A5", "Umbrella", "80331", "Marienplatz 9"));
    let report = orch.run(&grown, &mut store).unwrap();

    assert_eq!(report.inserted_before, 1);
    assert_eq!(store.external_id("A5"), Some("Z4"));
    assert_eq!(store.external_id("A1"), Some("Z1"));
}

#[test]
fn manual_match_survives_a_run() {
    let mut store = MemoryStore::from_rows(
        "firm_mapping",
        vec![firmlink_recon::MappingRow {
            local_id: "A1".into(),
            external_id: Some("MANUAL".into()),
        }],
    );
    orchestrator(&StrategySelection::default())
        .run(&registries(), &mut store)
        .unwrap();
    assert_eq!(store.external_id("A1"), Some("MANUAL"));
}

#[test]
fn orphaned_rows_are_kept() {
    let mut store = MemoryStore::from_rows(
        "firm_mapping",
        vec![firmlink_recon::MappingRow {
            local_id: "GONE".into(),
            external_id: None,
        }],
    );
    let report = orchestrator(&StrategySelection::default())
        .run(&registries(), &mut store)
        .unwrap();
    assert_eq!(report.summary.total, 5);
    assert!(store.unmatched_ids().unwrap().contains("GONE"));
}

#[test]
fn empty_registries() {
    let mut store = MemoryStore::new("firm_mapping");
    let report = orchestrator(&StrategySelection::default())
        .run(&RegistrySnapshot::default(), &mut store)
        .unwrap();
    assert_eq!(report.summary.total, 0);
    assert_eq!(report.summary.match_rate, 0.0);
}

#[test]
fn suffix_only_names_stay_unmatched() {
    let snapshot = RegistrySnapshot::new(
        vec![firm("A1", "GmbH", "10115", "Hauptstr. 5")],
        vec![account("Z1", "Ltd.", "10115", "Hauptstrasse 5")],
    );
    let mut store = MemoryStore::new("firm_mapping");
    let report = orchestrator(&StrategySelection::default())
        .run(&snapshot, &mut store)
        .unwrap();
    assert_eq!(store.external_id("A1"), None);
    assert_eq!(report.summary.matched, 0);
}

#[test]
fn ids_differing_only_by_whitespace_get_their_own_rows() {
    let snapshot = RegistrySnapshot::new(
        vec![
            firm("A1", "Acme", "10115", "Hauptstr. 5"),
            firm("A1 ", "Globex", "20095", "Mönckebergstr. 62"),
        ],
        vec![
            account("Z1", "Acme", "10115", "Hauptstr. 5"),
            account("Z2", "Globex", "20095", "Mönckebergstr. 62"),
        ],
    );
    let mut store = MemoryStore::new("firm_mapping");
    orchestrator(&StrategySelection::default())
        .run(&snapshot, &mut store)
        .unwrap();
    assert_eq!(store.rows().unwrap().len(), 2);
    assert_eq!(store.external_id("A1"), Some("Z1"));
    assert_eq!(store.external_id("A1 "), Some("Z2"));
}

// -------------------------------------------------------------------------
// Orchestration
// -------------------------------------------------------------------------

#[test]
fn earlier_strategy_wins() {
    let registry: Vec<Box<dyn MatchStrategy>> = vec![
        Box::new(Scripted::new("first", vec![("A1", "Z1")])),
        Box::new(Scripted::new("second", vec![("A1", "Z9"), ("A2", "Z2")])),
    ];
    let orch = Orchestrator::new(registry, &StrategySelection::default()).unwrap();
    let mut store = MemoryStore::new("firm_mapping");
    let report = orch.run(&registries(), &mut store).unwrap();

    assert_eq!(store.external_id("A1"), Some("Z1"));
    assert_eq!(store.external_id("A2"), Some("Z2"));
    assert_eq!(report.strategies[0].merged, 1);
    assert_eq!(report.strategies[1].merged, 1);
}

#[test]
fn each_strategy_sees_fresh_unmatched_set() {
    let first = Scripted::new("first", vec![("A1", "Z1"), ("A2", "Z2")]);
    let second = Scripted::new("second", Vec::new());
    let mut store = MemoryStore::new("firm_mapping");
    {
        let registry: Vec<Box<dyn MatchStrategy>> = vec![Box::new(first), Box::new(second)];
        let orch = Orchestrator::new(registry, &StrategySelection::default()).unwrap();
        let report = orch.run(&registries(), &mut store).unwrap();
        // Coverage never shrinks from one strategy to the next.
        assert!(report.strategies[0].matched_after <= report.strategies[1].matched_after);
    }
    let unmatched: Vec<String> = store.unmatched_ids().unwrap().into_iter().collect();
    assert_eq!(unmatched, vec!["A3".to_string(), "A4".to_string()]);
}

#[test]
fn scripted_strategy_receives_only_unmatched_ids() {
    let second = std::rc::Rc::new(Scripted::new("second", Vec::new()));

    struct Shared(std::rc::Rc<Scripted>);
    impl MatchStrategy for Shared {
        fn name(&self) -> &str {
            self.0.name()
        }
        fn description(&self) -> &str {
            self.0.description()
        }
        fn propose(
            &self,
            snapshot: &RegistrySnapshot,
            unmatched: &BTreeSet<String>,
        ) -> Result<Vec<MatchProposal>, ReconError> {
            self.0.propose(snapshot, unmatched)
        }
    }

    let registry: Vec<Box<dyn MatchStrategy>> = vec![
        Box::new(Scripted::new("first", vec![("A1", "Z1")])),
        Box::new(Shared(second.clone())),
    ];
    let orch = Orchestrator::new(registry, &StrategySelection::default()).unwrap();
    orch.run(&registries(), &mut MemoryStore::new("firm_mapping"))
        .unwrap();

    let seen = second.seen_unmatched.borrow();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].contains("A1"));
    assert_eq!(seen[0].len(), 3);
}

#[test]
fn failure_aborts_but_keeps_earlier_merges() {
    let registry: Vec<Box<dyn MatchStrategy>> = vec![
        Box::new(Scripted::new("first", vec![("A1", "Z1")])),
        Box::new(Scripted::failing("broken")),
        Box::new(Scripted::new("never", vec![("A2", "Z2")])),
    ];
    let orch = Orchestrator::new(registry, &StrategySelection::default()).unwrap();
    let mut store = MemoryStore::new("firm_mapping");
    let err = orch.run(&registries(), &mut store).unwrap_err();

    match err {
        ReconError::Strategy { ref name, .. } => assert_eq!(name, "broken"),
        other => panic!("expected strategy error, got {other:?}"),
    }
    assert!(err.to_string().contains("Billing_Code"));
    assert_eq!(store.external_id("A1"), Some("Z1"));
    assert_eq!(store.external_id("A2"), None);
}

#[test]
fn empty_selection_leaves_store_untouched() {
    let mut store = MemoryStore::new("firm_mapping");
    let report = orchestrator(&StrategySelection::only(Vec::<String>::new()))
        .run(&registries(), &mut store)
        .unwrap();
    assert!(report.strategies.is_empty());
    assert_eq!(report.inserted_before, 0);
    assert!(store.rows().unwrap().is_empty());
}

#[test]
fn unknown_strategy_is_a_config_error() {
    let config = MatchConfig::default();
    let err = Orchestrator::new(
        default_strategies(&config),
        &StrategySelection::from_list("name_match,phonetic"),
    )
    .err()
    .unwrap();
    assert!(err.is_config());
}

#[test]
fn report_serializes_for_json_output() {
    let mut store = MemoryStore::new("firm_mapping");
    let report = orchestrator(&StrategySelection::default())
        .dry_run(true)
        .run(&registries(), &mut store)
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["meta"]["dry_run"], true);
    assert_eq!(json["meta"]["target_table"], "firm_mapping");
    assert_eq!(json["summary"]["matched"], 3);
    assert_eq!(json["strategies"][0]["name"], "name_match");
}
