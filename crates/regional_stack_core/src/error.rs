/// Failures while obtaining the region set from the external directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// The directory could not be queried at all.
    #[error("region directory unreachable: {0}")]
    Unreachable(String),

    /// The directory answered with something that is not a region list.
    #[error("malformed region listing: {0}")]
    Malformed(String),
}

/// Failures that abort a generation run. No partial document is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Two distinct regions map onto the same child logical id.
    #[error("regions '{first}' and '{second}' both derive logical id '{logical_id}'")]
    DerivationCollision {
        logical_id: String,
        first: String,
        second: String,
    },

    /// The assembler saw the same logical id twice.
    #[error("duplicate logical id '{0}' in deployment document")]
    DuplicateIdentifier(String),

    /// A child points at a handler other than the document's single handler.
    #[error("child '{child}' references handler '{referenced}', expected '{expected}'")]
    ForeignHandler {
        child: String,
        referenced: String,
        expected: String,
    },

    #[error("invalid generation settings: {0}")]
    InvalidSettings(String),
}
