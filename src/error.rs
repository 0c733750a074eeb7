//! Error types for the STACKIT provider.

use thiserror::Error;

use crate::client::ApiError;

/// Errors returned by provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A looked-up object does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Configured values are inconsistent with what the API offers.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider block or an experiment gate rejected the call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No resource or data source is registered under the type name.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A state or config document did not match its model.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Permission denied by the remote API.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A wait handler gave up before the remote operation finished.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The provider is not in a state to run the call, e.g. configured twice.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation not supported by the backing API.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from the host (malformed import id, bad state document).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An API response or a configuration value could not be mapped.
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// A remote call failed.
    #[error("{context}: {source}")]
    Api {
        /// What the provider was doing when the call failed.
        context: String,
        /// The underlying collaborator error.
        #[source]
        source: ApiError,
    },
}

impl ProviderError {
    /// Classify a collaborator error.
    ///
    /// 403 responses become [`ProviderError::PermissionDenied`] and wait
    /// timeouts become [`ProviderError::DeadlineExceeded`], so callers can
    /// tell "access denied" apart from "not found".
    pub fn api(context: impl Into<String>, source: ApiError) -> Self {
        let context = context.into();
        if source.is_forbidden() {
            return Self::PermissionDenied(format!("{}: {}", context, source));
        }
        if let ApiError::Timeout { .. } = source {
            return Self::DeadlineExceeded(format!("{}: {}", context, source));
        }
        Self::Api { context, source }
    }

    /// Shorthand for a [`ProviderError::Mapping`] error.
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping(msg.into())
    }

    /// The message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::PermissionDenied(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::FailedPrecondition(msg) => msg,
            Self::Unimplemented(msg) => msg,
            Self::InvalidRequest(msg) => msg,
            Self::Mapping(msg) => msg,
            Self::Api { context, .. } => context,
        }
    }

    /// Whether the error wraps a remote 404/410.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: resource-123");

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::Mapping("received empty next_hop".to_string());
        assert_eq!(format!("{}", err), "Mapping error: received empty next_hop");
    }

    #[test]
    fn test_api_classification() {
        let err = ProviderError::api("Reading route", ApiError::http(403, "forbidden"));
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
        assert!(!err.is_not_found());

        let err = ProviderError::api(
            "Waiting for instance deletion",
            ApiError::Timeout {
                operation: "delete".to_string(),
                after: Duration::from_secs(2700),
            },
        );
        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));

        let err = ProviderError::api("Reading route", ApiError::http(404, "gone"));
        assert!(err.is_not_found());
        assert_eq!(format!("{}", err), "Reading route: HTTP 404: gone");

        let err = ProviderError::api("Reading route", ApiError::http(500, "boom"));
        assert!(matches!(err, ProviderError::Api { .. }));
        assert_eq!(err.message(), "Reading route");
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::Configuration("invalid config".to_string());
        assert_eq!(err.message(), "invalid config");

        let err = ProviderError::InvalidRequest("bad request".to_string());
        assert_eq!(err.message(), "bad request");
    }
}
