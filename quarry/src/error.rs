//! Error types for building and decoding expression trees

/// Construction and decode errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Duplicate node handle: {0}")]
    DuplicateHandle(String),

    #[error("Node handle not found: {0}")]
    HandleNotFound(String),

    #[error("Mapping conflict for field '{field}': {reason}")]
    MappingConflict { field: String, reason: String },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value at '{path}': expected {expected}")]
    InvalidType { path: String, expected: &'static str },

    #[error("Unknown bulk operation in response item: {0}")]
    UnknownBulkOp(String),

    #[error("Unsupported engine version: {0}")]
    UnsupportedVersion(String),

    #[error("Unknown engine distribution: {0}")]
    UnknownDistribution(String),

    #[error("Invalid version string: {0}")]
    InvalidVersion(String),

    #[error("Invalid term value for field '{field}': {reason}")]
    InvalidTerm { field: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_type(path: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidType {
            path: path.into(),
            expected,
        }
    }

    /// Whether this error was raised while reading a response
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_)
                | Self::InvalidType { .. }
                | Self::UnknownBulkOp(_)
                | Self::UnknownDistribution(_)
                | Self::InvalidVersion(_)
                | Self::InvalidTerm { .. }
                | Self::Json(_)
        )
    }
}
