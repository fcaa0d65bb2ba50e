//! CLI Exit Code Registry
//!
//! Single source of truth for `firmlink` exit codes. Scripts and schedulers
//! rely on them, so existing values never change meaning.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success (including runs that matched nothing)             |
//! | 1    | General error (unspecified)                               |
//! | 2    | Usage error (bad args, missing database or config file)   |
//! | 3    | Invalid config (parse, identifier, table, strategy name)  |
//! | 4    | A match strategy failed; earlier merges stay committed    |
//! | 5    | Store failure outside a strategy (open, load, write)      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant below
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in `CliError::from(ReconError)` if it comes from the engine

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure, e.g. cannot write the output file.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, no database given, file not found.
pub const EXIT_USAGE: u8 = 2;

/// Config rejected before the mapping table is touched.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// A strategy failed mid-run.
pub const EXIT_STRATEGY_FAILED: u8 = 4;

/// SQLite error while opening, loading registries or writing rows.
pub const EXIT_STORE: u8 = 5;
