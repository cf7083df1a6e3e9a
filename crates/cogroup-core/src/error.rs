use thiserror::Error;

/// Canonical result for core and the crates layered on it.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // --- configuration time -------------------------------------------------
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("field '{field}' is sorted in common scope with inconsistent types: '{first}' vs '{second}'")]
    TypeMismatch {
        field: String,
        first: String,
        second: String,
    },

    #[error("field '{field}' is sorted in common scope but missing from source '{source_name}'")]
    MissingCommonField { field: String, source_name: String },

    #[error("invalid source id usage: {0}")]
    InvalidSourceIdUsage(String),

    #[error("group-by fields {group_by:?} are not a prefix of the common order {common:?}")]
    GroupByNotPrefix {
        group_by: Vec<String>,
        common: Vec<String>,
    },

    #[error("secondary sort of source '{source_name}' names field '{field}' which is already sorted in common scope")]
    SecondarySortOnCommonField { field: String, source_name: String },

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{0}' has no intrinsic order and no custom comparator")]
    UnorderableField(String),

    // --- per record ---------------------------------------------------------
    #[error("field '{field}' with type {expected} can't contain {found}")]
    FieldTypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("field '{0}' can't contain a null value")]
    NullNotAllowed(String),

    #[error("schema '{0}' is not a configured source")]
    UnknownSource(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("Hashing error: {0}")]
    Hash(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl Error {
    /// True for errors that can only be raised while assembling a plan.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::Schema(_)
                | Error::TypeMismatch { .. }
                | Error::MissingCommonField { .. }
                | Error::InvalidSourceIdUsage(_)
                | Error::GroupByNotPrefix { .. }
                | Error::SecondarySortOnCommonField { .. }
                | Error::UnknownField(_)
                | Error::UnorderableField(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}
