//! OAuth error types.

use thiserror::Error;

/// Result type alias for OAuth operations.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Boxed underlying cause carried by [`OAuthError::Server`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the authorization and refresh flows.
///
/// Callers branch on the variant: configuration mistakes are fatal,
/// authentication problems restart the flow from `authorize()`, an
/// authentication failure after refresh forces a full re-authorization, and
/// server errors may be retried.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// Malformed endpoint or client setup.
    #[error("Configuration: {0}")]
    Configuration(String),

    /// User-facing authorization problem (cancelled, denied, bad callback,
    /// missing token in a successful response).
    #[error("Authorization: {0}")]
    Authentication(String),

    /// The refresh token was rejected by the server.
    #[error("Authorization failed")]
    AuthenticationFailure,

    /// Non-conforming HTTP status, transport failure or undecodable body.
    #[error("Server: {detail}")]
    Server {
        /// Human-readable description.
        detail: String,
        /// Underlying transport or decoding error.
        #[source]
        source: Option<BoxError>,
    },

    /// Fallback for branches that should never be reached.
    #[error("Unknown error")]
    Unknown,
}

/// Fieldless discriminant of [`OAuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`OAuthError::Configuration`].
    Configuration,
    /// See [`OAuthError::Authentication`].
    Authentication,
    /// See [`OAuthError::AuthenticationFailure`].
    AuthenticationFailure,
    /// See [`OAuthError::Server`].
    Server,
    /// See [`OAuthError::Unknown`].
    Unknown,
}

impl OAuthError {
    /// Creates a server error without an underlying cause.
    pub fn server(detail: impl Into<String>) -> Self {
        Self::Server {
            detail: detail.into(),
            source: None,
        }
    }

    /// Creates a server error chaining the underlying cause.
    pub fn server_with(detail: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Server {
            detail: detail.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::AuthenticationFailure => ErrorKind::AuthenticationFailure,
            Self::Server { .. } => ErrorKind::Server,
            Self::Unknown => ErrorKind::Unknown,
        }
    }

    /// Whether retrying the same request later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Server { .. })
    }

    /// Whether the caller must run a full authorization again.
    #[must_use]
    pub const fn requires_reauthorization(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::AuthenticationFailure)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            OAuthError::Configuration("bad url".into()).to_string(),
            "Configuration: bad url"
        );
        assert_eq!(
            OAuthError::Authentication("Cancelled login".into()).to_string(),
            "Authorization: Cancelled login"
        );
        assert_eq!(
            OAuthError::AuthenticationFailure.to_string(),
            "Authorization failed"
        );
        assert_eq!(OAuthError::server("boom").to_string(), "Server: boom");
        assert_eq!(OAuthError::Unknown.to_string(), "Unknown error");
    }

    #[test]
    fn test_server_error_chains_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = OAuthError::server_with("token request failed", io);

        let source = err.source().expect("source is chained");
        assert_eq!(source.to_string(), "timed out");
        assert!(OAuthError::server("plain").source().is_none());
    }

    #[test]
    fn test_kind_and_retryable() {
        assert_eq!(OAuthError::server("x").kind(), ErrorKind::Server);
        assert!(OAuthError::server("x").is_retryable());
        assert!(!OAuthError::AuthenticationFailure.is_retryable());
        assert!(OAuthError::AuthenticationFailure.requires_reauthorization());
        assert!(!OAuthError::Configuration("x".into()).requires_reauthorization());
    }
}
