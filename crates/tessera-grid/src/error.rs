//! Error types for the `tessera-grid` crate.

/// Errors produced while parsing a canonical cell key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// The key is not of the form `"q,r"`.
    #[error("malformed cell key: {0:?}")]
    MalformedKey(String),

    /// One of the components is not a valid integer.
    #[error("invalid coordinate {component:?} in cell key {key:?}")]
    InvalidCoordinate {
        /// The full key that failed to parse.
        key: String,
        /// The offending component.
        component: String,
    },
}
