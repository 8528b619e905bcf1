//! Error types for facet parsing.

/// Result type alias for facet parsing.
pub type Result<T> = std::result::Result<T, ParseFacetError>;

/// A facet value could not be parsed from text.
///
/// Compiling facets never fails; this error only arises when turning user
/// input (CLI flags, settings files) into typed facet selections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFacetError {
    /// The value is not one of the known options for the facet.
    #[error("unknown {facet} option: {value:?}")]
    UnknownOption {
        /// Facet name (e.g. "time range").
        facet: &'static str,
        /// Rejected input.
        value: String,
    },

    /// A custom date could not be parsed as `YYYY-MM-DD`.
    #[error("invalid date {value:?}: expected YYYY-MM-DD")]
    InvalidDate {
        /// Rejected input.
        value: String,
    },
}

impl ParseFacetError {
    pub(crate) fn unknown(facet: &'static str, value: &str) -> Self {
        Self::UnknownOption {
            facet,
            value: value.to_string(),
        }
    }
}
