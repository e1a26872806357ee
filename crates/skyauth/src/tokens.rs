//! Token exchange and refresh.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ClientIdentity, ServerEndpoints};
use crate::error::{OAuthError, Result};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};

/// Status code of a successful token response.
const TOKEN_SUCCESS_STATUS: u16 = 200;

/// Access and refresh token returned by the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// The access token.
    pub access_token: String,
    /// The refresh token, if the server issued one.
    pub refresh_token: Option<String>,
    /// Token type (`DPoP` or `Bearer`).
    pub token_type: Option<String>,
    /// Access token lifetime in seconds.
    pub expires_in: Option<u64>,
    /// Granted scope.
    pub scope: Option<String>,
    /// Subject (account DID).
    pub sub: Option<String>,
}

impl TokenPair {
    /// Keeps `previous` as the refresh token when the server omitted one.
    #[must_use]
    pub fn merge_refresh(mut self, previous: &str) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = Some(previous.to_string());
        }
        self
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("sub", &self.sub)
            .finish()
    }
}

/// Decodes a successful token response body.
///
/// Optional fields with an unexpected type are ignored.
///
/// # Errors
/// Returns [`OAuthError::Server`] if the body is not a JSON object and
/// [`OAuthError::Authentication`] if it has no non-empty string `access_token`.
pub fn decode_token_response(body: &[u8]) -> Result<TokenPair> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| OAuthError::server_with("no JSON in token response", e))?;
    let Value::Object(fields) = value else {
        return Err(OAuthError::server("no JSON in token response"));
    };

    let text = |key: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let access_token = text("access_token")
        .ok_or_else(|| OAuthError::Authentication("missing access token".into()))?;

    Ok(TokenPair {
        access_token,
        refresh_token: text("refresh_token"),
        token_type: text("token_type"),
        expires_in: fields.get("expires_in").and_then(Value::as_u64),
        scope: text("scope"),
        sub: text("sub"),
    })
}

/// Exchanges an authorization code for a token pair.
///
/// # Errors
/// - [`OAuthError::Authentication`] for HTTP 400/401 or a response without
///   `access_token`.
/// - [`OAuthError::Server`] for any other status, an undecodable body or a
///   transport failure.
pub async fn exchange_code<T: HttpTransport + ?Sized>(
    transport: &T,
    endpoints: &ServerEndpoints,
    identity: &ClientIdentity,
    code: &str,
    code_verifier: &str,
) -> Result<TokenPair> {
    let request = HttpRequest::post_form(
        endpoints.token_endpoint().clone(),
        [
            ("grant_type", "authorization_code"),
            ("scope", identity.scope()),
            ("code", code),
            ("client_id", identity.client_id()),
            ("redirect_uri", identity.redirect_uri()),
            ("code_verifier", code_verifier),
        ],
    );

    let response = transport
        .execute(request)
        .await
        .map_err(|e| OAuthError::server_with("token request failed", e))?;

    debug!(status = response.status, "token exchange response");

    match response.status {
        TOKEN_SUCCESS_STATUS => decode_token_response(&response.body),
        400 | 401 => {
            warn!(status = response.status, body = %response.text(), "token exchange rejected");
            Err(OAuthError::Authentication(format!(
                "invalid account information (HTTP {})",
                response.status
            )))
        }
        status => {
            warn!(status, "unexpected token exchange status");
            Err(invalid_status(status))
        }
    }
}

/// Result of [`refresh`]: the outcome plus whether a second request was sent.
#[derive(Debug)]
pub struct RefreshOutcome {
    /// New tokens, or why none were obtained.
    pub result: Result<TokenPair>,
    /// Whether the single retry was issued.
    pub retried: bool,
}

impl RefreshOutcome {
    fn first(result: Result<TokenPair>) -> Self {
        Self {
            result,
            retried: false,
        }
    }

    fn after_retry(result: Result<TokenPair>) -> Self {
        Self {
            result,
            retried: true,
        }
    }

    /// Converts into the plain result, dropping the retry flag.
    ///
    /// # Errors
    /// Returns the refresh error.
    pub fn into_result(self) -> Result<TokenPair> {
        self.result
    }
}

/// Exchanges a refresh token for a new token pair.
///
/// A non-200 first response triggers exactly one immediate, identical
/// retry. If the retry answers with `fail_status` the refresh token itself
/// is considered rejected and [`OAuthError::AuthenticationFailure`] is
/// returned; the caller should run a full authorization.
///
/// When the server omits `refresh_token`, the caller keeps the previous one
/// (see [`TokenPair::merge_refresh`]).
pub async fn refresh<T: HttpTransport + ?Sized>(
    transport: &T,
    endpoints: &ServerEndpoints,
    identity: &ClientIdentity,
    refresh_token: &str,
    fail_status: u16,
) -> RefreshOutcome {
    let request = HttpRequest::post_form(
        endpoints.token_endpoint().clone(),
        [
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("client_id", identity.client_id()),
        ],
    );

    let first = match transport.execute(request.clone()).await {
        Ok(response) => response,
        Err(e) => {
            return RefreshOutcome::first(Err(OAuthError::server_with("refresh request failed", e)));
        }
    };

    if first.status == TOKEN_SUCCESS_STATUS {
        return RefreshOutcome::first(decode_token_response(&first.body));
    }

    warn!(status = first.status, "refresh failed, retrying once");

    let retry = match transport.execute(request).await {
        Ok(response) => response,
        Err(e) => {
            return RefreshOutcome::after_retry(Err(OAuthError::server_with(
                "refresh retry request failed",
                e,
            )));
        }
    };

    RefreshOutcome::after_retry(classify_retry(&retry, fail_status))
}

fn classify_retry(response: &HttpResponse, fail_status: u16) -> Result<TokenPair> {
    match response.status {
        TOKEN_SUCCESS_STATUS => decode_token_response(&response.body),
        status if status == fail_status => {
            warn!(status, "refresh token rejected");
            Err(OAuthError::AuthenticationFailure)
        }
        status => {
            warn!(status, "refresh retry failed");
            Err(invalid_status(status))
        }
    }
}

fn invalid_status(status: u16) -> OAuthError {
    OAuthError::server(format!("invalid response code: {status}"))
}

/// Token endpoint operations bound to one client and server.
///
/// Lets callers refresh independently of an
/// [`Authorizer`](crate::authorize::Authorizer).
#[derive(Debug, Clone)]
pub struct TokenClient<T> {
    transport: T,
    endpoints: ServerEndpoints,
    identity: ClientIdentity,
}

impl<T: HttpTransport> TokenClient<T> {
    /// Creates a token client.
    pub fn new(transport: T, endpoints: ServerEndpoints, identity: ClientIdentity) -> Self {
        Self {
            transport,
            endpoints,
            identity,
        }
    }

    /// See [`exchange_code`].
    ///
    /// # Errors
    /// See [`exchange_code`].
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenPair> {
        exchange_code(
            &self.transport,
            &self.endpoints,
            &self.identity,
            code,
            code_verifier,
        )
        .await
    }

    /// See [`refresh`].
    pub async fn refresh(&self, refresh_token: &str, fail_status: u16) -> RefreshOutcome {
        refresh(
            &self.transport,
            &self.endpoints,
            &self.identity,
            refresh_token,
            fail_status,
        )
        .await
    }
}
