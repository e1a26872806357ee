//! Scripted transport and launcher for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::consent::{ConsentError, ConsentLauncher, ConsentRequest};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Replays canned responses in order and records every request.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<Result<HttpResponse, String>>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, response: HttpResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    pub(crate) fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push(HttpResponse::new(status, body.to_string()));
    }

    pub(crate) fn push_transport_error(&self, message: &str) {
        self.responses.lock().push_back(Err(message.to_string()));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request);
        match self.responses.lock().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(message.into()),
            None => Err("no scripted response left".into()),
        }
    }
}

/// How the scripted launcher answers.
#[derive(Clone)]
pub(crate) enum LauncherScript {
    /// Redirect with `code`, echoing the `state` sent in PAR.
    Approve { code: String },
    /// Redirect to an explicit callback URL.
    Callback(Url),
    /// Report an error from the launcher.
    Fail(ConsentError),
}

/// Consent launcher that answers every request the same way and records
/// the requests it was given.
pub(crate) struct ScriptedLauncher {
    script: LauncherScript,
    transport: ScriptedTransport,
    presented: Mutex<Vec<ConsentRequest>>,
}

impl ScriptedLauncher {
    /// `transport` is consulted to echo back the `state` of the most recent
    /// PAR request, as a real authorization server would.
    pub(crate) fn new(script: LauncherScript, transport: ScriptedTransport) -> Self {
        Self {
            script,
            transport,
            presented: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn presented(&self) -> Vec<ConsentRequest> {
        self.presented.lock().clone()
    }
}

#[async_trait]
impl ConsentLauncher for ScriptedLauncher {
    async fn present(&self, request: ConsentRequest) -> Result<Url, ConsentError> {
        let redirect =
            Url::parse("app.example:/oauth").map_err(|e| ConsentError::Failed(e.to_string()))?;
        self.presented.lock().push(request);

        match &self.script {
            LauncherScript::Approve { code } => {
                let state = self
                    .transport
                    .requests()
                    .iter()
                    .rev()
                    .find_map(|r| r.form_params().get("state").cloned())
                    .unwrap_or_default();
                let mut url = redirect;
                url.query_pairs_mut()
                    .append_pair("code", code)
                    .append_pair("state", &state);
                Ok(url)
            }
            LauncherScript::Callback(url) => Ok(url.clone()),
            LauncherScript::Fail(error) => Err(error.clone()),
        }
    }
}
