//! Error types for the DuploCloud provider.

use thiserror::Error;

use crate::client::ClientError;

/// Errors returned by provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Input failed validation before any API call was made.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider configuration is incomplete or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A handler ran before `configure` installed a client.
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A resource ID did not have the expected shape.
    #[error("invalid resource ID: {0}")]
    InvalidId(String),

    /// The control plane rejected a request or could not be reached.
    #[error("{0}")]
    Api(#[from] ClientError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Waiting for the control plane to converge took too long.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Get the error message as a string.
    ///
    /// Returns a reference to the error message for any variant.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::NotConfigured(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::InvalidId(msg) => msg,
            Self::Api(err) => err.message(),
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Timeout(msg) => msg,
            Self::Unimplemented(msg) => msg,
        }
    }

    /// True when the error is a control-plane 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(err) if err.is_not_found())
    }

    /// Wrap an API error with handler context.
    pub(crate) fn api_context(context: impl std::fmt::Display, err: ClientError) -> Self {
        Self::Api(err.context(context))
    }
}
