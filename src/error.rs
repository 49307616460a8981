//! Fragments error types

use thiserror::Error;

/// Fragments error type
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid construction input (unsupported type, missing owner, ...)
    #[error("Validation error on {field}: {message}")]
    Validation {
        /// Name of the offending field
        field: &'static str,
        message: String,
    },

    /// No metadata or no data for the given key
    #[error("Not found: {0}")]
    NotFound(String),

    /// Source/target pairing is not in the legal-target table
    #[error("Unsupported conversion: {from} cannot be converted to {to}")]
    UnsupportedConversion { from: String, to: String },

    /// Requested target could not be resolved to a media type at all
    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    /// Source bytes could not be decoded or re-encoded
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Backend I/O failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// True for failures caused by the caller's input rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::NotFound(_)
                | Self::UnsupportedConversion { .. }
                | Self::UnknownTarget(_)
                | Self::Conversion(_)
        )
    }
}

/// Result type alias for Fragments operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_names_field() {
        let err = Error::validation("ownerId", "ownerId is required");
        assert!(err.to_string().contains("ownerId"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_storage_is_server_error() {
        assert!(!Error::Storage("disk full".into()).is_client_error());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert!(!Error::from(io).is_client_error());
    }
}
