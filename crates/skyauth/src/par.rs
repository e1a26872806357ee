//! PAR (Pushed Authorization Requests) client.
//!
//! Implements the client side of RFC 9126: the authorization parameters are
//! posted to the server, which answers with a short-lived `request_uri`
//! handle used in the browser redirect.

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::{ClientIdentity, ServerEndpoints};
use crate::error::{OAuthError, Result};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::pkce::CHALLENGE_METHOD;

/// Prefix for PAR request URIs.
pub const REQUEST_URI_PREFIX: &str = "urn:ietf:params:oauth:request_uri:";

/// Status code of a successful PAR response.
const PAR_SUCCESS_STATUS: u16 = 201;

/// OAuth error codes that point at the client configuration rather than the server.
const CONFIGURATION_ERROR_CODES: &[&str] = &[
    "invalid_client",
    "invalid_request",
    "invalid_scope",
    "unauthorized_client",
    "invalid_redirect_uri",
];

/// Parameters of a pushed authorization request.
#[derive(Debug, Clone)]
pub struct ParRequest<'a> {
    identity: &'a ClientIdentity,
    code_challenge: &'a str,
    state: &'a str,
    login_hint: Option<&'a str>,
}

impl<'a> ParRequest<'a> {
    /// Creates a request for `identity` carrying the PKCE challenge and `state`.
    #[must_use]
    pub const fn new(
        identity: &'a ClientIdentity,
        code_challenge: &'a str,
        state: &'a str,
    ) -> Self {
        Self {
            identity,
            code_challenge,
            state,
            login_hint: None,
        }
    }

    /// Sets the login hint (handle or DID).
    #[must_use]
    pub fn with_login_hint(mut self, login_hint: Option<&'a str>) -> Self {
        self.login_hint = login_hint;
        self
    }

    /// The form fields of the request.
    #[must_use]
    pub fn params(&self) -> Vec<(&'a str, &'a str)> {
        let mut params = vec![
            ("client_id", self.identity.client_id()),
            ("response_type", "code"),
            ("code_challenge", self.code_challenge),
            ("code_challenge_method", CHALLENGE_METHOD),
            ("state", self.state),
            ("redirect_uri", self.identity.redirect_uri()),
            ("scope", self.identity.scope()),
        ];
        if let Some(hint) = self.login_hint {
            params.push(("login_hint", hint));
        }
        params
    }
}

/// PAR response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ParResponse {
    /// The request URI to use in the authorization redirect.
    pub request_uri: String,
    /// Lifetime of the request URI in seconds.
    pub expires_in: Option<u64>,
}

/// Error body returned by an OAuth endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// Error code such as `invalid_request`.
    pub error: String,
    /// Optional human-readable description.
    pub error_description: Option<String>,
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {description}", self.error),
            None => f.write_str(&self.error),
        }
    }
}

/// Pushes an authorization request and returns the `request_uri` handle.
///
/// Only HTTP 201 with a `request_uri` counts as success. The handle is
/// single-use and must not be cached.
///
/// # Errors
/// Returns [`OAuthError::Configuration`] when the server rejects the client
/// setup and [`OAuthError::Server`] for transport failures, any other
/// status or an undecodable body.
pub async fn push_authorization_request<T: HttpTransport + ?Sized>(
    transport: &T,
    endpoints: &ServerEndpoints,
    request: &ParRequest<'_>,
) -> Result<String> {
    let http_request = HttpRequest::post_form(endpoints.par_endpoint().clone(), request.params());

    let response = transport
        .execute(http_request)
        .await
        .map_err(|e| OAuthError::server_with("PAR request failed", e))?;

    debug!(status = response.status, "PAR response");

    if response.status != PAR_SUCCESS_STATUS {
        return Err(par_failure(&response));
    }

    let body: ParResponse = serde_json::from_slice(&response.body)
        .map_err(|e| OAuthError::server_with("missing request_uri in PAR response", e))?;

    if !body.request_uri.starts_with(REQUEST_URI_PREFIX) {
        return Err(OAuthError::server(format!(
            "unexpected request_uri format: {}",
            body.request_uri
        )));
    }

    Ok(body.request_uri)
}

fn par_failure(response: &HttpResponse) -> OAuthError {
    match serde_json::from_slice::<ErrorResponse>(&response.body) {
        Ok(error) => {
            warn!(status = response.status, error = %error.error, "PAR request rejected");
            let detail = format!("PAR rejected (HTTP {}): {error}", response.status);
            if CONFIGURATION_ERROR_CODES.contains(&error.error.as_str()) {
                OAuthError::Configuration(detail)
            } else {
                OAuthError::server(detail)
            }
        }
        Err(_) => {
            warn!(status = response.status, "PAR request failed");
            OAuthError::server(format!(
                "invalid PAR response code: {} ({})",
                response.status,
                response.text().trim()
            ))
        }
    }
}

/// Builds the URL the user agent opens for consent.
#[must_use]
pub fn authorization_url(
    endpoints: &ServerEndpoints,
    identity: &ClientIdentity,
    request_uri: &str,
) -> Url {
    let mut url = endpoints.authorization_endpoint().clone();
    url.query_pairs_mut()
        .append_pair("client_id", identity.client_id())
        .append_pair("request_uri", request_uri);
    url
}
