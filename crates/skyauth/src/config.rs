//! Client identity, server endpoints and client metadata.
//!
//! All of these are fixed at startup and read-only afterwards.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{OAuthError, Result};
use crate::http::{HttpRequest, HttpTransport};

/// Default requested scope.
pub const DEFAULT_SCOPE: &str = "atproto";

/// Default authorization server.
pub const DEFAULT_ISSUER: &str = "https://bsky.social";

/// Path of the authorization server metadata document (RFC 8414).
const DISCOVERY_PATH: &str = "/.well-known/oauth-authorization-server";

/// Identity of this client as registered with the authorization server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    client_id: String,
    redirect_uri: String,
    callback_scheme: String,
    scope: String,
}

impl ClientIdentity {
    /// Creates and validates a client identity.
    ///
    /// `client_id` is the URL of the client metadata document,
    /// `redirect_uri` the (usually custom-scheme) callback URI and `scope`
    /// the space-delimited permission set.
    ///
    /// # Errors
    /// Returns [`OAuthError::Configuration`] if any value is malformed.
    /// The URLs are validated but sent exactly as given, since the server
    /// compares them with the registered metadata as strings.
    pub fn new(client_id: &str, redirect_uri: &str, scope: &str) -> Result<Self> {
        let client_url = Url::parse(client_id)
            .map_err(|e| OAuthError::Configuration(format!("invalid client_id: {e}")))?;
        match client_url.scheme() {
            "https" => {}
            "http" if is_loopback(&client_url) => {}
            other => {
                return Err(OAuthError::Configuration(format!(
                    "client_id must be an https URL, got {other}"
                )));
            }
        }

        let redirect_url = Url::parse(redirect_uri)
            .map_err(|e| OAuthError::Configuration(format!("invalid redirect_uri: {e}")))?;

        let scope = scope.split_whitespace().collect::<Vec<_>>().join(" ");
        if !scope.split(' ').any(|s| s == DEFAULT_SCOPE) {
            return Err(OAuthError::Configuration(format!(
                "scope must include {DEFAULT_SCOPE}"
            )));
        }

        Ok(Self {
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            callback_scheme: redirect_url.scheme().to_string(),
            scope,
        })
    }

    /// The client identifier (metadata document URL).
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The registered redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// The scheme the consent launcher should watch for.
    #[must_use]
    pub fn callback_scheme(&self) -> &str {
        &self.callback_scheme
    }

    /// The requested scope.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }
}

fn is_loopback(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"))
}

/// Endpoints of the authorization server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoints {
    issuer: Url,
    par_endpoint: Url,
    authorization_endpoint: Url,
    token_endpoint: Url,
}

impl ServerEndpoints {
    /// Creates endpoints from explicit URLs.
    ///
    /// # Errors
    /// Returns [`OAuthError::Configuration`] if any URL is malformed.
    pub fn new(
        issuer: &str,
        par_endpoint: &str,
        authorization_endpoint: &str,
        token_endpoint: &str,
    ) -> Result<Self> {
        Ok(Self {
            issuer: parse_endpoint("issuer", issuer)?,
            par_endpoint: parse_endpoint("par_endpoint", par_endpoint)?,
            authorization_endpoint: parse_endpoint(
                "authorization_endpoint",
                authorization_endpoint,
            )?,
            token_endpoint: parse_endpoint("token_endpoint", token_endpoint)?,
        })
    }

    /// Derives the conventional endpoint paths from an issuer URL.
    ///
    /// # Errors
    /// Returns [`OAuthError::Configuration`] if the issuer is malformed.
    pub fn from_issuer(issuer: &str) -> Result<Self> {
        let base = issuer.trim_end_matches('/');
        Self::new(
            base,
            &format!("{base}/oauth/par"),
            &format!("{base}/oauth/authorize"),
            &format!("{base}/oauth/token"),
        )
    }

    /// Fetches the authorization server metadata from the issuer.
    ///
    /// # Errors
    /// Returns [`OAuthError::Server`] if the document cannot be fetched or
    /// decoded, and [`OAuthError::Configuration`] if it advertises a
    /// different issuer or no PAR endpoint.
    pub async fn discover<T: HttpTransport + ?Sized>(transport: &T, issuer: &str) -> Result<Self> {
        let issuer_url = parse_endpoint("issuer", issuer)?;
        let url = issuer_url
            .join(DISCOVERY_PATH)
            .map_err(|e| OAuthError::Configuration(format!("invalid issuer: {e}")))?;

        let response = transport
            .execute(HttpRequest::get(url))
            .await
            .map_err(|e| OAuthError::server_with("metadata request failed", e))?;

        if response.status != 200 {
            return Err(OAuthError::server(format!(
                "invalid response code: {} while fetching server metadata",
                response.status
            )));
        }

        let metadata: AuthorizationServerMetadata = serde_json::from_slice(&response.body)
            .map_err(|e| OAuthError::server_with("invalid server metadata", e))?;

        if metadata.issuer.trim_end_matches('/') != issuer.trim_end_matches('/') {
            return Err(OAuthError::Configuration(format!(
                "issuer mismatch: expected {issuer}, got {}",
                metadata.issuer
            )));
        }

        let par_endpoint = metadata
            .pushed_authorization_request_endpoint
            .ok_or_else(|| {
                OAuthError::Configuration("server does not advertise a PAR endpoint".into())
            })?;

        debug!(issuer = %metadata.issuer, "discovered authorization server");

        Self::new(
            &metadata.issuer,
            &par_endpoint,
            &metadata.authorization_endpoint,
            &metadata.token_endpoint,
        )
    }

    /// The issuer identifier.
    #[must_use]
    pub const fn issuer(&self) -> &Url {
        &self.issuer
    }

    /// The pushed authorization request endpoint.
    #[must_use]
    pub const fn par_endpoint(&self) -> &Url {
        &self.par_endpoint
    }

    /// The user-facing authorization endpoint.
    #[must_use]
    pub const fn authorization_endpoint(&self) -> &Url {
        &self.authorization_endpoint
    }

    /// The token endpoint, used for both exchange and refresh.
    #[must_use]
    pub const fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }
}

fn parse_endpoint(name: &str, value: &str) -> Result<Url> {
    let url =
        Url::parse(value).map_err(|e| OAuthError::Configuration(format!("invalid {name}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(OAuthError::Configuration(format!(
            "{name} must be an absolute http(s) URL"
        )));
    }
    Ok(url)
}

/// Subset of RFC 8414 metadata this client reads.
#[derive(Debug, Deserialize)]
struct AuthorizationServerMetadata {
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    pushed_authorization_request_endpoint: Option<String>,
}

/// Client metadata document served at the `client_id` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// Client ID (the URL this document is served at).
    pub client_id: String,
    /// Human-readable client name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Always `native` for custom-scheme redirects.
    pub application_type: String,
    /// Grant types the client uses.
    pub grant_types: Vec<String>,
    /// Response types the client uses.
    pub response_types: Vec<String>,
    /// Allowed redirect URIs.
    pub redirect_uris: Vec<String>,
    /// Requested scope.
    pub scope: String,
    /// Public client: no token endpoint authentication.
    pub token_endpoint_auth_method: String,
}

impl ClientMetadata {
    /// Builds the metadata document describing `identity`.
    #[must_use]
    pub fn for_identity(identity: &ClientIdentity, client_name: Option<String>) -> Self {
        Self {
            client_id: identity.client_id().to_string(),
            client_name,
            application_type: "native".to_string(),
            grant_types: vec![
                "authorization_code".to_string(),
                "refresh_token".to_string(),
            ],
            response_types: vec!["code".to_string()],
            redirect_uris: vec![identity.redirect_uri().to_string()],
            scope: identity.scope().to_string(),
            token_endpoint_auth_method: "none".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, Method};
    use crate::testing::ScriptedTransport;

    fn identity() -> ClientIdentity {
        ClientIdentity::new(
            "https://app.example/client-metadata.json",
            "app.example:/oauth",
            "atproto",
        )
        .unwrap()
    }

    #[test]
    fn test_identity_accessors() {
        let id = identity();
        assert_eq!(id.client_id(), "https://app.example/client-metadata.json");
        assert_eq!(id.redirect_uri(), "app.example:/oauth");
        assert_eq!(id.callback_scheme(), "app.example");
        assert_eq!(id.scope(), "atproto");
    }

    #[test]
    fn test_identity_normalizes_scope_whitespace() {
        let id = ClientIdentity::new(
            "https://app.example/client-metadata.json",
            "app.example:/oauth",
            "  atproto   transition:generic ",
        )
        .unwrap();
        assert_eq!(id.scope(), "atproto transition:generic");
    }

    #[test]
    fn test_identity_rejects_bad_values() {
        let cases = [
            ("not a url", "app.example:/oauth", "atproto"),
            ("ftp://app.example/meta.json", "app.example:/oauth", "atproto"),
            ("http://app.example/meta.json", "app.example:/oauth", "atproto"),
            ("https://app.example/meta.json", "no scheme", "atproto"),
            ("https://app.example/meta.json", "app.example:/oauth", ""),
            ("https://app.example/meta.json", "app.example:/oauth", "profile"),
        ];
        for (client_id, redirect_uri, scope) in cases {
            let result = ClientIdentity::new(client_id, redirect_uri, scope);
            assert!(
                matches!(result, Err(OAuthError::Configuration(_))),
                "{client_id} {redirect_uri} {scope}"
            );
        }
    }

    #[test]
    fn test_identity_keeps_urls_verbatim() {
        let id = ClientIdentity::new("https://app.example", "http://127.0.0.1", "atproto").unwrap();
        assert_eq!(id.client_id(), "https://app.example");
        assert_eq!(id.redirect_uri(), "http://127.0.0.1");
        assert_eq!(id.callback_scheme(), "http");

        let metadata = ClientMetadata::for_identity(&id, None);
        assert_eq!(metadata.client_id, "https://app.example");
        assert_eq!(metadata.redirect_uris, ["http://127.0.0.1"]);
    }

    #[test]
    fn test_identity_allows_loopback_http() {
        assert!(ClientIdentity::new(
            "http://localhost/client-metadata.json",
            "http://127.0.0.1/callback",
            "atproto"
        )
        .is_ok());
    }

    #[test]
    fn test_endpoints_from_issuer() {
        let endpoints = ServerEndpoints::from_issuer("https://bsky.social/").unwrap();
        assert_eq!(endpoints.par_endpoint().as_str(), "https://bsky.social/oauth/par");
        assert_eq!(
            endpoints.authorization_endpoint().as_str(),
            "https://bsky.social/oauth/authorize"
        );
        assert_eq!(endpoints.token_endpoint().as_str(), "https://bsky.social/oauth/token");
    }

    #[test]
    fn test_endpoints_reject_relative() {
        let result = ServerEndpoints::new("https://a.example", "/par", "https://a", "https://a");
        assert!(matches!(result, Err(OAuthError::Configuration(_))));
        let result =
            ServerEndpoints::new("https://a.example", "mailto:x@y", "https://a", "https://a");
        assert!(matches!(result, Err(OAuthError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_discover() {
        let transport = ScriptedTransport::new();
        transport.push_json(
            200,
            serde_json::json!({
                "issuer": "https://auth.example",
                "authorization_endpoint": "https://auth.example/oauth/authorize",
                "token_endpoint": "https://auth.example/oauth/token",
                "pushed_authorization_request_endpoint": "https://auth.example/oauth/par",
            }),
        );

        let endpoints = ServerEndpoints::discover(&transport, "https://auth.example")
            .await
            .unwrap();

        assert_eq!(endpoints.par_endpoint().as_str(), "https://auth.example/oauth/par");
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(
            requests[0].url.as_str(),
            "https://auth.example/.well-known/oauth-authorization-server"
        );
    }

    #[tokio::test]
    async fn test_discover_issuer_mismatch() {
        let transport = ScriptedTransport::new();
        transport.push_json(
            200,
            serde_json::json!({
                "issuer": "https://evil.example",
                "authorization_endpoint": "https://evil.example/oauth/authorize",
                "token_endpoint": "https://evil.example/oauth/token",
                "pushed_authorization_request_endpoint": "https://evil.example/oauth/par",
            }),
        );

        let result = ServerEndpoints::discover(&transport, "https://auth.example").await;
        assert!(matches!(result, Err(OAuthError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_discover_failures_are_server_errors() {
        let transport = ScriptedTransport::new();
        transport.push(HttpResponse::new(404, "not found"));
        transport.push(HttpResponse::new(200, "<html>"));
        transport.push_transport_error("connection refused");

        for _ in 0..3 {
            let result = ServerEndpoints::discover(&transport, "https://auth.example").await;
            assert!(matches!(result, Err(OAuthError::Server { .. })));
        }
    }

    #[test]
    fn test_client_metadata_document() {
        let metadata = ClientMetadata::for_identity(&identity(), Some("Example".into()));
        let json = serde_json::to_value(&metadata).unwrap();

        assert_eq!(json["client_id"], "https://app.example/client-metadata.json");
        assert_eq!(json["client_name"], "Example");
        assert_eq!(json["application_type"], "native");
        assert_eq!(json["redirect_uris"][0], "app.example:/oauth");
        assert_eq!(json["token_endpoint_auth_method"], "none");

        let anonymous =
            serde_json::to_value(ClientMetadata::for_identity(&identity(), None)).unwrap();
        assert!(anonymous.get("client_name").is_none());
    }
}
