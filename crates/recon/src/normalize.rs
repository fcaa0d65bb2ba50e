//! Canonical comparison keys for firm names.

use std::sync::OnceLock;

use deunicode::deunicode;
use regex::Regex;

/// Legal-entity suffixes removed as whole words.
pub const LEGAL_SUFFIXES: [&str; 7] = ["llc", "inc", "ltd", "corp", "corporation", "plc", "gmbh"];

/// HTML entity artifact for `&` left behind by the CRM export.
const AMPERSAND_ENTITY: &str = "&#38;";

fn suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternation = LEGAL_SUFFIXES.join("|");
        Regex::new(&format!(r"\b(?:{alternation})\b")).expect("static suffix pattern")
    })
}

/// Reduce a firm name to its comparison key.
///
/// Removes the `&#38;` artifact, lower-cases, transliterates to ASCII, drops
/// whole-word legal suffixes and keeps only `[a-z0-9]`. A name that collapses
/// to a bare legal suffix ("L.L.C.") yields the empty key, so the function is
/// idempotent. Never fails: blank input gives an empty key, which never
/// matches anything downstream.
pub fn normalize(name: &str) -> String {
    let lowered = name.replace(AMPERSAND_ENTITY, "").to_lowercase();
    let ascii = deunicode(&lowered).to_lowercase();
    let stripped = suffix_re().replace_all(&ascii, "");
    let key: String = stripped
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();

    if LEGAL_SUFFIXES.contains(&key.as_str()) {
        String::new()
    } else {
        key
    }
}

/// `normalize` over an optional field.
pub fn normalize_opt(name: Option<&str>) -> String {
    name.map(normalize).unwrap_or_default()
}
