//! Client and server settings shared by all commands.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use skyauth::config::{DEFAULT_ISSUER, DEFAULT_SCOPE};
use skyauth::{ClientIdentity, ReqwestTransport, ServerEndpoints};

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// URL of the client metadata document
    #[arg(long, global = true, env = "SKYAUTH_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Redirect URI registered in the client metadata
    #[arg(long, global = true, env = "SKYAUTH_REDIRECT_URI")]
    pub redirect_uri: Option<String>,

    /// Space-separated scopes to request
    #[arg(long, global = true, env = "SKYAUTH_SCOPE", default_value = DEFAULT_SCOPE)]
    pub scope: String,

    /// Authorization server issuer
    #[arg(long, global = true, env = "SKYAUTH_ISSUER", default_value = DEFAULT_ISSUER)]
    pub issuer: String,

    /// PAR endpoint (skips discovery together with the other two endpoints)
    #[arg(long, global = true, env = "SKYAUTH_PAR_ENDPOINT")]
    pub par_endpoint: Option<String>,

    /// Authorization endpoint
    #[arg(long, global = true, env = "SKYAUTH_AUTHORIZATION_ENDPOINT")]
    pub authorization_endpoint: Option<String>,

    /// Token endpoint
    #[arg(long, global = true, env = "SKYAUTH_TOKEN_ENDPOINT")]
    pub token_endpoint: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, global = true, env = "SKYAUTH_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,
}

impl Settings {
    /// Builds the validated client identity.
    pub fn identity(&self) -> Result<ClientIdentity> {
        let client_id = self
            .client_id
            .as_deref()
            .context("missing client id (set --client-id or SKYAUTH_CLIENT_ID)")?;
        let redirect_uri = self
            .redirect_uri
            .as_deref()
            .context("missing redirect URI (set --redirect-uri or SKYAUTH_REDIRECT_URI)")?;

        ClientIdentity::new(client_id, redirect_uri, &self.scope)
            .context("invalid client configuration")
    }

    pub fn transport(&self) -> Result<ReqwestTransport> {
        ReqwestTransport::new(Duration::from_secs(self.timeout))
            .context("failed to build HTTP client")
    }

    /// Uses the explicitly configured endpoints, or discovers them from the issuer.
    pub async fn endpoints(&self, transport: &ReqwestTransport) -> Result<ServerEndpoints> {
        if let Some(endpoints) = self.explicit_endpoints()? {
            return Ok(endpoints);
        }

        ServerEndpoints::discover(transport, &self.issuer)
            .await
            .with_context(|| format!("failed to discover endpoints of {}", self.issuer))
    }

    fn explicit_endpoints(&self) -> Result<Option<ServerEndpoints>> {
        match (
            &self.par_endpoint,
            &self.authorization_endpoint,
            &self.token_endpoint,
        ) {
            (None, None, None) => Ok(None),
            (Some(par), Some(authorization), Some(token)) => {
                ServerEndpoints::new(&self.issuer, par, authorization, token)
                    .map(Some)
                    .context("invalid endpoint configuration")
            }
            _ => bail!(
                "set all of --par-endpoint, --authorization-endpoint and --token-endpoint, or none"
            ),
        }
    }
}
