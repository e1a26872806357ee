//! Interactive consent step.
//!
//! Presenting the authorization URL and capturing the redirect is host
//! business: a system browser session, a webview, or a terminal prompt. The
//! host implements [`ConsentLauncher`]; the coordinator awaits exactly one
//! resolution per attempt.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;
use url::Url;

/// What the launcher is asked to present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequest {
    /// URL to open in the user agent.
    pub authorization_url: Url,
    /// Scheme of the redirect URI that ends the session.
    pub callback_scheme: String,
    /// Prefer a private browser session that shares no cookies.
    pub ephemeral: bool,
}

/// Why the consent step produced no callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsentError {
    /// The user dismissed the session.
    #[error("cancelled")]
    Cancelled,
    /// The session failed for any other reason.
    #[error("{0}")]
    Failed(String),
}

/// Host-provided interactive consent capability.
#[async_trait]
pub trait ConsentLauncher: Send + Sync {
    /// Presents `request` and resolves with the callback URL.
    ///
    /// Must report user cancellation as [`ConsentError::Cancelled`].
    async fn present(&self, request: ConsentRequest) -> Result<Url, ConsentError>;
}

#[async_trait]
impl<L: ConsentLauncher + ?Sized> ConsentLauncher for std::sync::Arc<L> {
    async fn present(&self, request: ConsentRequest) -> Result<Url, ConsentError> {
        (**self).present(request).await
    }
}

/// Creates a one-shot completion pair for callback-driven hosts.
///
/// The host keeps the [`ConsentCompletion`] and calls
/// [`resolve`](ConsentCompletion::resolve) from its completion callback;
/// the launcher awaits [`ConsentPending::wait`].
#[must_use]
pub fn channel() -> (ConsentCompletion, ConsentPending) {
    let (tx, rx) = oneshot::channel();
    (ConsentCompletion { tx }, ConsentPending { rx })
}

/// Resolving half of a consent session. Consumed on use.
#[derive(Debug)]
pub struct ConsentCompletion {
    tx: oneshot::Sender<Result<Url, ConsentError>>,
}

impl ConsentCompletion {
    /// Resolves the session. Returns `false` if nobody is waiting anymore.
    pub fn resolve(self, result: Result<Url, ConsentError>) -> bool {
        self.tx.send(result).is_ok()
    }

    /// Shorthand for resolving with [`ConsentError::Cancelled`].
    pub fn cancel(self) -> bool {
        self.resolve(Err(ConsentError::Cancelled))
    }
}

/// Awaiting half of a consent session.
#[derive(Debug)]
pub struct ConsentPending {
    rx: oneshot::Receiver<Result<Url, ConsentError>>,
}

impl ConsentPending {
    /// Waits for the single resolution.
    ///
    /// A completion dropped without resolving yields
    /// `ConsentError::Failed("consent session closed")`.
    pub async fn wait(self) -> Result<Url, ConsentError> {
        self.rx
            .await
            .unwrap_or_else(|_| Err(ConsentError::Failed("consent session closed".into())))
    }
}

/// Query parameters of the redirect callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    /// Authorization code.
    pub code: Option<String>,
    /// Echoed `state`.
    pub state: Option<String>,
    /// Issuer identifier (RFC 9207).
    pub iss: Option<String>,
    /// OAuth error code.
    pub error: Option<String>,
    /// OAuth error description.
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Extracts the known parameters from a callback URL's query string.
    ///
    /// Parameters with empty values are treated as absent.
    #[must_use]
    pub fn parse(callback: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in callback.query_pairs() {
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "iss" => &mut params.iss,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_resolves_once() {
        let (completion, pending) = channel();
        let url = Url::parse("app.example:/oauth?code=abc").unwrap();

        assert!(completion.resolve(Ok(url.clone())));
        assert_eq!(pending.wait().await, Ok(url));
    }

    #[tokio::test]
    async fn test_channel_cancel() {
        let (completion, pending) = channel();
        assert!(completion.cancel());
        assert_eq!(pending.wait().await, Err(ConsentError::Cancelled));
    }

    #[tokio::test]
    async fn test_channel_dropped_completion() {
        let (completion, pending) = channel();
        drop(completion);
        assert_eq!(
            pending.wait().await,
            Err(ConsentError::Failed("consent session closed".into()))
        );
    }

    #[test]
    fn test_resolve_after_waiter_gone() {
        let (completion, pending) = channel();
        drop(pending);
        assert!(!completion.cancel());
    }

    #[test]
    fn test_callback_params() {
        let url = Url::parse(
            "app.example:/oauth?state=s1&iss=https%3A%2F%2Fauth.example&code=c1&code=c2&extra=1",
        )
        .unwrap();
        let params = CallbackParams::parse(&url);

        assert_eq!(params.code.as_deref(), Some("c1"));
        assert_eq!(params.state.as_deref(), Some("s1"));
        assert_eq!(params.iss.as_deref(), Some("https://auth.example"));
        assert!(params.error.is_none());
    }

    #[test]
    fn test_callback_params_error_and_empty_code() {
        let url = Url::parse(
            "app.example:/oauth?error=access_denied&error_description=User+denied&code=",
        )
        .unwrap();
        let params = CallbackParams::parse(&url);

        assert!(params.code.is_none());
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("User denied"));
    }
}
