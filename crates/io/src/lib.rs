// SQLite and CSV I/O for the matching pipeline

pub mod export;
pub mod sqlite;

pub use sqlite::{Database, SqliteMappingStore, SqliteRegistry};
