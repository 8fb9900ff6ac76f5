//! Error types for huly-tracker operations.

use thiserror::Error;

/// The error type for tracker operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Required configuration (workspace, credentials) is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The backend session could not be established or was lost.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of entity that was looked up (e.g. "Project", "Issue").
        entity: &'static str,
        /// The lookup key that failed to resolve.
        key: String,
    },

    /// Input could not be parsed or violates a structural rule.
    #[error("Invalid {field}: '{value}'. {reason}")]
    Validation {
        /// The field or argument that was rejected.
        field: &'static str,
        /// The offending input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The backend rejected or failed an operation.
    #[error("Backend error: {0}")]
    Backend(String),

    /// An HTTP transport error from the REST backend.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::NotFound`] for the given entity kind and key.
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Build a [`Error::Validation`] for the given field.
    pub fn validation(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for tracker operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_carries_key() {
        let err = Error::not_found("Issue", "HULY-42");
        assert_eq!(err.to_string(), "Issue not found: HULY-42");
    }

    #[test]
    fn test_validation_message() {
        let err = Error::validation("issue identifier", "HULY42", "Expected PROJECT-NUMBER");
        assert_eq!(
            err.to_string(),
            "Invalid issue identifier: 'HULY42'. Expected PROJECT-NUMBER"
        );
    }
}
