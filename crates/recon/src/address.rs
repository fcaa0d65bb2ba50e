//! Postal address normalization.
//!
//! Free-text street lines are handed to an [`AddressParser`] for labelling;
//! this module only cleans the labelled pieces into comparable fields. Road
//! cleaning is a best-effort heuristic tuned for German street names.

use std::collections::HashMap;
use std::sync::OnceLock;

use deunicode::deunicode;
use regex::Regex;

use crate::error::ReconError;

/// Country appended to composed addresses when none is configured.
pub const DEFAULT_COUNTRY: &str = "Deutschland";

// ---------------------------------------------------------------------------
// Parser collaborator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressLabel {
    Road,
    HouseNumber,
    Postcode,
    City,
    Country,
}

impl AddressLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Road => "road",
            Self::HouseNumber => "house_number",
            Self::Postcode => "postcode",
            Self::City => "city",
            Self::Country => "country",
        }
    }
}

impl std::fmt::Display for AddressLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits a free-text address into labelled tokens, in input order.
pub trait AddressParser {
    fn parse_address(&self, text: &str) -> Result<Vec<(String, AddressLabel)>, ReconError>;
}

/// Parser for the comma-separated layout the registries use:
/// `"<road> <house number>, <postcode> [city], <country>"`.
#[derive(Debug, Clone, Default)]
pub struct StreetLineParser;

const COUNTRY_NAMES: [&str; 8] = [
    "deutschland",
    "germany",
    "de",
    "osterreich",
    "austria",
    "schweiz",
    "switzerland",
    "ch",
];

fn street_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<road>.*?\D)\s*(?P<number>\d+\s*[a-zA-Z]?(?:\s*[-/]\s*\d+\s*[a-zA-Z]?)?)$",
        )
        .expect("static street pattern")
    })
}

fn postcode_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<postcode>\d{4,5})(?:\s+(?P<city>.+))?$").expect("static postcode pattern")
    })
}

impl AddressParser for StreetLineParser {
    fn parse_address(&self, text: &str) -> Result<Vec<(String, AddressLabel)>, ReconError> {
        if !text.chars().any(char::is_alphanumeric) {
            return Err(ReconError::AddressParse {
                text: text.to_string(),
                reason: "no alphanumeric content".into(),
            });
        }

        let segments: Vec<&str> = text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let mut tokens = Vec::new();

        for (i, segment) in segments.iter().enumerate() {
            if i == 0 {
                match street_line_re().captures(segment) {
                    Some(caps) => {
                        let road = caps["road"].trim();
                        if !road.is_empty() {
                            tokens.push((road.to_string(), AddressLabel::Road));
                        }
                        tokens.push((caps["number"].to_string(), AddressLabel::HouseNumber));
                    }
                    None => tokens.push((segment.to_string(), AddressLabel::Road)),
                }
                continue;
            }

            if let Some(caps) = postcode_re().captures(segment) {
                tokens.push((caps["postcode"].to_string(), AddressLabel::Postcode));
                if let Some(city) = caps.name("city") {
                    tokens.push((city.as_str().trim().to_string(), AddressLabel::City));
                }
            } else if i == segments.len() - 1
                && COUNTRY_NAMES.contains(&deunicode(segment).to_lowercase().as_str())
            {
                tokens.push((segment.to_string(), AddressLabel::Country));
            } else {
                tokens.push((segment.to_string(), AddressLabel::City));
            }
        }

        Ok(tokens)
    }
}

// ---------------------------------------------------------------------------
// Road + house number cleaning
// ---------------------------------------------------------------------------

fn street_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"strasse\b|str\.|str\b").expect("static street suffix pattern"))
}

/// Canonical road key: lower-cased, street suffix removed, ASCII, alphanumeric.
///
/// Returns `None` for blank input and for roads that clean down to nothing,
/// so a missing road can never act as a wildcard in a join. Any word ending
/// in `str` loses that ending, whether or not it abbreviates `strasse`.
pub fn clean_road(text: Option<&str>) -> Option<String> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }
    let lowered = text.to_lowercase().replace('ß', "ss");
    let without_suffix = street_suffix_re().replace_all(&lowered, "");
    let road: String = deunicode(&without_suffix)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();
    (!road.is_empty()).then_some(road)
}

/// Split a house number like `62-64` or `62/64` into its numeric parts.
///
/// Splits on the first `-` or `/`, keeps only the digits of each side, and
/// maps a side without digits to `None`.
pub fn split_house_number(raw: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return (None, None);
    };
    let mut parts = raw.splitn(2, ['-', '/']);
    let primary = parts.next().and_then(digits_only);
    let secondary = parts.next().and_then(digits_only);
    (primary, secondary)
}

fn digits_only(part: &str) -> Option<String> {
    let digits: String = part.chars().filter(char::is_ascii_digit).collect();
    (!digits.is_empty()).then_some(digits)
}

// ---------------------------------------------------------------------------
// Normalized address
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedAddress {
    pub road: Option<String>,
    /// Raw house number token, lower-cased with whitespace removed.
    pub house_number: Option<String>,
    pub house_primary: Option<String>,
    pub house_secondary: Option<String>,
    pub postal_code: Option<String>,
}

impl NormalizedAddress {
    pub fn from_parts(
        road: Option<&str>,
        house_number: Option<&str>,
        postal_code: Option<&str>,
    ) -> Self {
        let (house_primary, house_secondary) = split_house_number(house_number);
        let house_number = house_number
            .map(|h| h.split_whitespace().collect::<String>().to_lowercase())
            .filter(|h| !h.is_empty());
        let postal_code = postal_code
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        Self {
            road: clean_road(road),
            house_number,
            house_primary,
            house_secondary,
            postal_code,
        }
    }

    /// Road and postal code present; the address can take part in a join.
    pub fn is_joinable(&self) -> bool {
        self.road.is_some() && self.postal_code.is_some()
    }

    /// Join predicate: same road, same postal code, and at least one house
    /// number component equal. Absent components never compare equal.
    pub fn same_location(&self, other: &NormalizedAddress) -> bool {
        self.is_joinable()
            && self.road == other.road
            && self.postal_code == other.postal_code
            && (both_eq(&self.house_number, &other.house_number)
                || both_eq(&self.house_primary, &other.house_primary)
                || both_eq(&self.house_secondary, &other.house_secondary))
    }
}

fn both_eq(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

/// Parse a street line plus postal code into a [`NormalizedAddress`].
///
/// The street line, postal code and country are composed into one address
/// string for the parser. When a label occurs more than once the last value
/// wins. The parsed postcode is preferred over the supplied one.
pub fn parse(
    parser: &dyn AddressParser,
    street: &str,
    postal_code: &str,
    country: &str,
) -> Result<NormalizedAddress, ReconError> {
    let raw = format!("{street}, {postal_code}, {country}");
    let labelled: HashMap<AddressLabel, String> = parser
        .parse_address(&raw)?
        .into_iter()
        .map(|(value, label)| (label, value))
        .collect();

    let postcode = labelled
        .get(&AddressLabel::Postcode)
        .map(String::as_str)
        .unwrap_or(postal_code);

    Ok(NormalizedAddress::from_parts(
        labelled.get(&AddressLabel::Road).map(String::as_str),
        labelled.get(&AddressLabel::HouseNumber).map(String::as_str),
        Some(postcode),
    ))
}
