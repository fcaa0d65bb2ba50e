use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (bad threshold, empty table name, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A strategy named in the selection is not registered.
    #[error("unknown strategy: '{0}'")]
    UnknownStrategy(String),
    /// Table or column name that fails the identifier allow-list.
    #[error("invalid identifier: '{0}'")]
    InvalidIdentifier(String),
    /// A configured registry table does not exist in the data source.
    #[error("unknown table: '{0}'")]
    UnknownTable(String),
    /// The address-parsing collaborator rejected its input.
    #[error("cannot parse address '{text}': {reason}")]
    AddressParse { text: String, reason: String },
    /// Query or statement failure in the backing store.
    #[error("store error: {0}")]
    Store(String),
    /// IO error (file read, etc.).
    #[error("IO error: {0}")]
    Io(String),
    /// A match strategy failed; the run was aborted after it.
    #[error("strategy '{name}' failed: {source}")]
    Strategy {
        name: String,
        #[source]
        source: Box<ReconError>,
    },
}

impl ReconError {
    /// True for errors raised before the mapping table is touched.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse(_)
                | Self::ConfigValidation(_)
                | Self::UnknownStrategy(_)
                | Self::InvalidIdentifier(_)
                | Self::UnknownTable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_error_names_the_strategy() {
        let err = ReconError::Strategy {
            name: "address_match".into(),
            source: Box::new(ReconError::Store("disk I/O error".into())),
        };
        assert_eq!(
            err.to_string(),
            "strategy 'address_match' failed: store error: disk I/O error"
        );
        assert!(!err.is_config());
    }

    #[test]
    fn config_errors_are_classified() {
        assert!(ReconError::UnknownStrategy("fuzzy".into()).is_config());
        assert!(ReconError::InvalidIdentifier("a;b".into()).is_config());
        assert!(!ReconError::Io("gone".into()).is_config());
    }
}
