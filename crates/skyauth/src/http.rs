//! HTTP transport used by the OAuth flows.
//!
//! The flows talk to the authorization server through [`HttpTransport`] so
//! the network layer can be swapped. [`ReqwestTransport`] is the default.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use url::form_urlencoded;
use url::Url;

/// Default timeout for a single request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Error returned by a transport when no HTTP response was obtained.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// HTTP method of an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST` with a form-encoded body.
    Post,
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Target URL.
    pub url: Url,
    /// Form-encoded body for `POST` requests.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a form-encoded `POST` request.
    #[must_use]
    pub fn post_form<'a, I>(url: Url, params: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            method: Method::Post,
            url,
            body: Some(encode_form(params)),
        }
    }

    /// Creates a `GET` request.
    #[must_use]
    pub const fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            body: None,
        }
    }

    /// Decodes the form body, if any, for inspection.
    #[must_use]
    pub fn form_params(&self) -> BTreeMap<String, String> {
        self.body.as_deref().map(decode_form).unwrap_or_default()
    }
}

/// A received response: status code and raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Lossy UTF-8 view of the body for diagnostics.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends requests to the authorization server.
///
/// Implementations return `Err` only when no HTTP response was received
/// (connection failure, timeout). Any status code is an `Ok` response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Executes a single request.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for std::sync::Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request).await
    }
}

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport whose requests time out after `timeout`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                crate::OAuthError::Configuration(format!("failed to create HTTP client: {e}"))
            })?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    /// Uses [`DEFAULT_HTTP_TIMEOUT`], falling back to reqwest's defaults if
    /// the configured client cannot be built.
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_TIMEOUT)
            .unwrap_or_else(|_| Self::with_client(reqwest::Client::new()))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let builder = match request.method {
            Method::Get => self.client.get(request.url),
            Method::Post => self
                .client
                .post(request.url)
                .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(request.body.unwrap_or_default()),
        };

        let response = builder
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status, body })
    }
}

/// Encodes key/value pairs as an `application/x-www-form-urlencoded` body.
pub fn encode_form<'a, I>(params: I) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish()
        .into_bytes()
}

/// Decodes a form body into a sorted map. Later duplicates win.
#[must_use]
pub fn decode_form(body: &[u8]) -> BTreeMap<String, String> {
    form_urlencoded::parse(body).into_owned().collect()
}
