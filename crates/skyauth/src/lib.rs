//! OAuth client for AT Protocol authorization servers.
//!
//! This crate implements:
//! - RFC 7636 PKCE (Proof Key for Code Exchange), S256 only
//! - RFC 9126 PAR (Pushed Authorization Requests)
//! - The authorization code flow with an interactive consent step supplied by the host
//! - Token exchange and refresh, with a single immediate retry on refresh
//! - RFC 8414 authorization server discovery and the client metadata document
//!
//! ```rust,ignore
//! use skyauth::{Authorizer, ClientIdentity, ReqwestTransport, ServerEndpoints};
//!
//! let identity = ClientIdentity::new(
//!     "https://app.example/client-metadata.json",
//!     "app.example:/oauth",
//!     "atproto",
//! )?;
//! let transport = ReqwestTransport::new(skyauth::http::DEFAULT_HTTP_TIMEOUT)?;
//! let endpoints = ServerEndpoints::discover(&transport, "https://bsky.social").await?;
//! let authorizer = Authorizer::new(identity, endpoints, transport, my_launcher);
//!
//! let tokens = authorizer.authorize(Some("alice.bsky.social")).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authorize;
pub mod config;
pub mod consent;
pub mod error;
pub mod http;
pub mod par;
pub mod pkce;
pub mod tokens;

#[cfg(test)]
mod testing;

pub use authorize::{AuthorizationAttempt, AuthorizationState, Authorizer};
pub use config::{ClientIdentity, ClientMetadata, ServerEndpoints};
pub use consent::{ConsentError, ConsentLauncher, ConsentRequest};
pub use error::{ErrorKind, OAuthError, Result};
pub use http::{HttpTransport, ReqwestTransport};
pub use pkce::Pkce;
pub use tokens::{RefreshOutcome, TokenClient, TokenPair};
