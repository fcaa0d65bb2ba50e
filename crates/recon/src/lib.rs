//! `firmlink-recon`: firm-matching engine.
//!
//! Pure engine crate: receives a registry snapshot, runs ordered match
//! strategies, merges proposals into a mapping store.
//! No CLI or SQL dependencies.

pub mod address;
pub mod address_match;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod matcher;
pub mod model;
pub mod name_match;
pub mod normalize;
pub mod similarity;
pub mod store;

pub use config::MatchConfig;
pub use engine::Orchestrator;
pub use error::ReconError;
pub use matcher::{default_strategies, MatchStrategy};
pub use model::{MappingRow, MappingSummary, MatchProposal, RegistrySnapshot, RunReport};
pub use store::{MappingStore, MemoryStore, RegistrySource};
