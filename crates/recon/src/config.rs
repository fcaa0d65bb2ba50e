use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::address::DEFAULT_COUNTRY;
use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchConfig {
    /// Path to the SQLite database holding registries and mapping table.
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub registries: RegistriesConfig,
    #[serde(default)]
    pub strategies: StrategySelection,
    #[serde(default)]
    pub name_match: NameMatchConfig,
    #[serde(default)]
    pub address_match: AddressMatchConfig,
}

// ---------------------------------------------------------------------------
// Mapping table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingConfig {
    #[serde(default = "default_mapping_table")]
    pub table: String,
}

fn default_mapping_table() -> String {
    "firm_mapping".into()
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            table: default_mapping_table(),
        }
    }
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistriesConfig {
    #[serde(default)]
    pub local: LocalRegistryConfig,
    #[serde(default)]
    pub crm: CrmRegistryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalRegistryConfig {
    #[serde(default = "default_local_table")]
    pub table: String,
    #[serde(default)]
    pub columns: LocalColumns,
}

fn default_local_table() -> String {
    "local_firms".into()
}

impl Default for LocalRegistryConfig {
    fn default() -> Self {
        Self {
            table: default_local_table(),
            columns: LocalColumns::default(),
        }
    }
}

/// Column mapping for Registry A.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalColumns {
    pub id: String,
    pub name: String,
    pub short_code: String,
    pub postal_code: String,
    pub street: String,
}

impl Default for LocalColumns {
    fn default() -> Self {
        Self {
            id: "rec_id".into(),
            name: "name".into(),
            short_code: "kuerzel".into(),
            postal_code: "plz".into(),
            street: "strasse".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrmRegistryConfig {
    #[serde(default = "default_crm_table")]
    pub table: String,
    #[serde(default)]
    pub columns: CrmColumns,
}

fn default_crm_table() -> String {
    "crm_accounts".into()
}

impl Default for CrmRegistryConfig {
    fn default() -> Self {
        Self {
            table: default_crm_table(),
            columns: CrmColumns::default(),
        }
    }
}

/// Column mapping for Registry B.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrmColumns {
    pub id: String,
    pub name: String,
    pub postal_code: String,
    pub street: String,
}

impl Default for CrmColumns {
    fn default() -> Self {
        Self {
            id: "Id".into(),
            name: "Account_Name".into(),
            postal_code: "Billing_Code".into(),
            street: "Billing_Street".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Which registered strategies run. `None` runs every strategy that is
/// enabled by default; `Some` runs exactly the named ones, in registration
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategySelection {
    #[serde(default)]
    pub enabled: Option<Vec<String>>,
}

impl StrategySelection {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Parse a comma-separated list (`"name_match, address_match"`).
    /// Blank input keeps the defaults.
    pub fn from_list(list: &str) -> Self {
        let names: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if names.is_empty() {
            Self::default()
        } else {
            Self {
                enabled: Some(names),
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NameMatchConfig {
    /// Candidates need similarity strictly above this unless keys are equal.
    #[serde(default = "default_name_threshold")]
    pub threshold: f64,
}

fn default_name_threshold() -> f64 {
    0.95
}

impl Default for NameMatchConfig {
    fn default() -> Self {
        Self {
            threshold: default_name_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressMatchConfig {
    /// Address candidates need name similarity strictly above this unless one
    /// name contains the other.
    #[serde(default = "default_address_threshold")]
    pub threshold: f64,
    /// Country appended to composed addresses before parsing.
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_address_threshold() -> f64 {
    0.7
}

fn default_country() -> String {
    DEFAULT_COUNTRY.into()
}

impl Default for AddressMatchConfig {
    fn default() -> Self {
        Self {
            threshold: default_address_threshold(),
            country: default_country(),
        }
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)?$")
            .expect("static identifier pattern")
    })
}

/// Check a table or column name against the allow-list and return it quoted
/// for interpolation into SQL (`main.firms` becomes `"main"."firms"`).
pub fn quote_identifier(name: &str) -> Result<String, ReconError> {
    if !identifier_re().is_match(name) {
        return Err(ReconError::InvalidIdentifier(name.to_string()));
    }
    Ok(name
        .split('.')
        .map(|part| format!("\"{part}\""))
        .collect::<Vec<_>>()
        .join("."))
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl MatchConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: MatchConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let local = &self.registries.local;
        let crm = &self.registries.crm;
        let identifiers = [
            &self.mapping.table,
            &local.table,
            &local.columns.id,
            &local.columns.name,
            &local.columns.short_code,
            &local.columns.postal_code,
            &local.columns.street,
            &crm.table,
            &crm.columns.id,
            &crm.columns.name,
            &crm.columns.postal_code,
            &crm.columns.street,
        ];
        for ident in identifiers {
            quote_identifier(ident)?;
        }

        for (section, threshold) in [
            ("name_match", self.name_match.threshold),
            ("address_match", self.address_match.threshold),
        ] {
            if !(0.0..1.0).contains(&threshold) {
                return Err(ReconError::ConfigValidation(format!(
                    "{section}.threshold must be in [0, 1), got {threshold}"
                )));
            }
        }

        if self.address_match.country.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "address_match.country must not be blank".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
