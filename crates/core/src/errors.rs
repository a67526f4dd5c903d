/// Result type alias for assetgate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for resolution operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Credential endpoint unreachable or returned no usable token
    #[error("credential unavailable: {message}")]
    CredentialUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Resource endpoint rejected the credential even after a forced refresh
    #[error("authorization rejected for '{reference}' after credential refresh")]
    AuthorizationRejected { reference: String },

    /// Retryable failures exhausted the configured attempt budget
    #[error("transient failure for '{reference}' persisted across {attempts} attempts (last status {last_status})")]
    TransientExhausted {
        reference: String,
        attempts: u32,
        last_status: u16,
    },

    /// Non-retryable fetch failure
    #[error("terminal failure for '{reference}': {message}")]
    Terminal { reference: String, message: String },

    /// Network-level errors (connect, DNS, body read)
    #[error("network error for '{endpoint}': {message}")]
    Network { endpoint: String, message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create a credential-unavailable error
    #[must_use]
    pub fn credential_unavailable(message: impl Into<String>) -> Self {
        Error::CredentialUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a credential-unavailable error with a source error
    #[must_use]
    pub fn credential_unavailable_with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::CredentialUnavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create an authorization-rejected error
    #[must_use]
    pub fn authorization_rejected(reference: impl Into<String>) -> Self {
        Error::AuthorizationRejected {
            reference: reference.into(),
        }
    }

    /// Create a transient-exhaustion error
    #[must_use]
    pub fn transient_exhausted(
        reference: impl Into<String>,
        attempts: u32,
        last_status: u16,
    ) -> Self {
        Error::TransientExhausted {
            reference: reference.into(),
            attempts,
            last_status,
        }
    }

    /// Create a terminal fetch error
    #[must_use]
    pub fn terminal(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Terminal {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Create a network error
    #[must_use]
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }
}
