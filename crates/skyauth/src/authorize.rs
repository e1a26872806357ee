//! Authorization coordinator.
//!
//! Drives one attempt through PKCE generation, the pushed authorization
//! request, the interactive consent step and the code exchange:
//!
//! ```text
//! Idle -> RequestingPar -> AwaitingConsent -> ExchangingCode -> Authorized
//!              |                 |                  |
//!              +-----------------+------------------+--------> Failed
//! ```
//!
//! Every call to [`Authorizer::authorize`] owns its own
//! [`AuthorizationAttempt`]; nothing mutable is shared between calls.

use tracing::{debug, info, warn};
use url::Url;

use crate::config::{ClientIdentity, ServerEndpoints};
use crate::consent::{CallbackParams, ConsentError, ConsentLauncher, ConsentRequest};
use crate::error::{OAuthError, Result};
use crate::http::HttpTransport;
use crate::par::{self, ParRequest};
use crate::pkce::{self, Pkce};
use crate::tokens::{self, RefreshOutcome, TokenPair};

/// Progress of a single authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationState {
    /// Not started.
    Idle,
    /// Pushing the authorization request.
    RequestingPar,
    /// Waiting for the user in the consent launcher.
    AwaitingConsent,
    /// Redeeming the authorization code.
    ExchangingCode,
    /// Tokens obtained.
    Authorized,
    /// The attempt ended with an error.
    Failed,
}

impl AuthorizationState {
    /// Whether `next` is a legal successor of this state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::RequestingPar)
                | (Self::RequestingPar, Self::AwaitingConsent | Self::Failed)
                | (Self::AwaitingConsent, Self::ExchangingCode | Self::Failed)
                | (Self::ExchangingCode, Self::Authorized | Self::Failed)
        )
    }

    /// Whether the attempt is over.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Authorized | Self::Failed)
    }
}

impl std::fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::RequestingPar => "requesting_par",
            Self::AwaitingConsent => "awaiting_consent",
            Self::ExchangingCode => "exchanging_code",
            Self::Authorized => "authorized",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Secrets and progress of one authorization attempt.
///
/// Lives only for the duration of one [`Authorizer::authorize`] call.
#[derive(Debug)]
pub struct AuthorizationAttempt {
    pkce: Pkce,
    state: String,
    request_uri: Option<String>,
    current: AuthorizationState,
}

impl AuthorizationAttempt {
    /// Starts an attempt with a fresh PKCE pair and `state`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pkce: Pkce::generate(),
            state: pkce::generate_state(),
            request_uri: None,
            current: AuthorizationState::Idle,
        }
    }

    /// The PKCE pair of this attempt.
    #[must_use]
    pub const fn pkce(&self) -> &Pkce {
        &self.pkce
    }

    /// The anti-CSRF `state` of this attempt.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// The `request_uri` returned by PAR, once known.
    #[must_use]
    pub fn request_uri(&self) -> Option<&str> {
        self.request_uri.as_deref()
    }

    /// The current state.
    #[must_use]
    pub const fn current(&self) -> AuthorizationState {
        self.current
    }

    /// Moves to `next`.
    ///
    /// # Errors
    /// Returns [`OAuthError::Unknown`] for an illegal transition.
    pub fn advance(&mut self, next: AuthorizationState) -> Result<()> {
        if !self.current.can_transition_to(next) {
            warn!(from = %self.current, to = %next, "illegal authorization transition");
            return Err(OAuthError::Unknown);
        }
        debug!(from = %self.current, to = %next, "authorization transition");
        self.current = next;
        Ok(())
    }

    /// Records `error` as the end of the attempt and hands it back.
    fn fail(&mut self, error: OAuthError) -> OAuthError {
        if !self.current.is_terminal() {
            debug!(from = %self.current, error = %error, "authorization failed");
            self.current = AuthorizationState::Failed;
        }
        error
    }

    /// Checks a callback against this attempt and extracts the code.
    ///
    /// # Errors
    /// Returns [`OAuthError::Authentication`] if the callback carries an
    /// error, no code, or a `state` or issuer that does not match.
    pub fn verify_callback(&self, callback: &Url, issuer: &Url) -> Result<String> {
        let params = CallbackParams::parse(callback);

        if let Some(error) = params.error {
            let detail = match params.error_description {
                Some(description) => format!("Access denied: {error} ({description})"),
                None => format!("Access denied: {error}"),
            };
            return Err(OAuthError::Authentication(detail));
        }

        let code = params
            .code
            .ok_or_else(|| OAuthError::Authentication("Access denied".into()))?;

        if params.state.as_deref() != Some(self.state.as_str()) {
            return Err(OAuthError::Authentication("state mismatch".into()));
        }

        if let Some(iss) = params.iss {
            if iss.trim_end_matches('/') != issuer.as_str().trim_end_matches('/') {
                return Err(OAuthError::Authentication("issuer mismatch".into()));
            }
        }

        Ok(code)
    }
}

impl Default for AuthorizationAttempt {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the authorize flow against one authorization server.
///
/// Configuration, transport and launcher are read-only, so one
/// `Authorizer` can serve concurrent `authorize()` calls; each call is an
/// independent attempt.
pub struct Authorizer<T, L> {
    identity: ClientIdentity,
    endpoints: ServerEndpoints,
    transport: T,
    launcher: L,
    ephemeral: bool,
}

impl<T: HttpTransport, L: ConsentLauncher> Authorizer<T, L> {
    /// Creates an authorizer.
    pub fn new(
        identity: ClientIdentity,
        endpoints: ServerEndpoints,
        transport: T,
        launcher: L,
    ) -> Self {
        Self {
            identity,
            endpoints,
            transport,
            launcher,
            ephemeral: true,
        }
    }

    /// Whether the launcher should prefer a private browser session (default `true`).
    #[must_use]
    pub fn with_ephemeral_session(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    /// The configured client identity.
    #[must_use]
    pub const fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// The configured server endpoints.
    #[must_use]
    pub const fn endpoints(&self) -> &ServerEndpoints {
        &self.endpoints
    }

    /// Runs a complete authorization and returns the token pair.
    ///
    /// `login_hint` (a handle or DID) is forwarded in the pushed request.
    ///
    /// # Errors
    /// - [`OAuthError::Authentication`] when the user cancels or denies,
    ///   the callback is malformed, or the token response lacks an access token.
    /// - [`OAuthError::Configuration`] when the server rejects the client setup.
    /// - [`OAuthError::Server`] for transport failures and unexpected responses.
    pub async fn authorize(&self, login_hint: Option<&str>) -> Result<TokenPair> {
        let mut attempt = AuthorizationAttempt::new();
        let result = self.run(&mut attempt, login_hint).await;
        match &result {
            Ok(_) => info!("authorization complete"),
            Err(e) => warn!(error = %e, state = %attempt.current(), "authorization failed"),
        }
        result
    }

    async fn run(
        &self,
        attempt: &mut AuthorizationAttempt,
        login_hint: Option<&str>,
    ) -> Result<TokenPair> {
        attempt.advance(AuthorizationState::RequestingPar)?;

        let request = ParRequest::new(&self.identity, attempt.pkce().challenge(), attempt.state())
            .with_login_hint(login_hint);
        let request_uri =
            par::push_authorization_request(&self.transport, &self.endpoints, &request)
                .await
                .map_err(|e| attempt.fail(e))?;
        attempt.request_uri = Some(request_uri);

        attempt.advance(AuthorizationState::AwaitingConsent)?;

        let authorization_url = par::authorization_url(
            &self.endpoints,
            &self.identity,
            attempt.request_uri().unwrap_or_default(),
        );
        let consent = ConsentRequest {
            authorization_url,
            callback_scheme: self.identity.callback_scheme().to_string(),
            ephemeral: self.ephemeral,
        };

        let callback = self.launcher.present(consent).await.map_err(|e| {
            attempt.fail(match e {
                ConsentError::Cancelled => OAuthError::Authentication("Cancelled login".into()),
                ConsentError::Failed(detail) => OAuthError::Authentication(detail),
            })
        })?;

        let code = attempt
            .verify_callback(&callback, self.endpoints.issuer())
            .map_err(|e| attempt.fail(e))?;

        attempt.advance(AuthorizationState::ExchangingCode)?;

        let tokens = tokens::exchange_code(
            &self.transport,
            &self.endpoints,
            &self.identity,
            &code,
            attempt.pkce().verifier(),
        )
        .await
        .map_err(|e| attempt.fail(e))?;

        attempt.advance(AuthorizationState::Authorized)?;
        Ok(tokens)
    }

    /// Refreshes tokens with the same transport and configuration.
    ///
    /// See [`tokens::refresh`].
    pub async fn refresh(&self, refresh_token: &str, fail_status: u16) -> RefreshOutcome {
        tokens::refresh(
            &self.transport,
            &self.endpoints,
            &self.identity,
            refresh_token,
            fail_status,
        )
        .await
    }
}
