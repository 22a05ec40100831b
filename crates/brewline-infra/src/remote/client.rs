//! `WorkflowEngine` over HTTP.
//!
//! Talks to the `/api/v1` surface served by `brewline worker`. Responses
//! arrive wrapped in the `{data, meta, errors}` envelope; an error entry's
//! code is mapped back to the matching [`EngineError`] variant. Anything
//! that prevents a response from arriving at all is `EngineError::Transport`.

use std::time::Duration;

use brewline_core::engine::{
    EngineError, StartOptions, StartRequest, WorkflowEngine, WorkflowHandle,
};
use reqwest::{Method, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Default server address for clients.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:7233";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    detail: Option<String>,
}

/// Turn an envelope body into its payload or the error it carries.
fn unwrap_envelope(status: reqwest::StatusCode, body: &str) -> Result<Value, EngineError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| {
        EngineError::Unavailable(format!("malformed response (HTTP {status}): {e}"))
    })?;

    if let Some(error) = envelope.errors.into_iter().next() {
        let detail = error.detail.unwrap_or(error.message);
        return Err(EngineError::from_code(&error.code, detail));
    }
    if !status.is_success() {
        return Err(EngineError::Unavailable(format!("HTTP {status}")));
    }
    Ok(envelope.data.unwrap_or(Value::Null))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Remote engine handle.
#[derive(Debug, Clone)]
pub struct HttpEngineClient {
    base: Url,
    http: reqwest::Client,
}

impl HttpEngineClient {
    /// `server` is the root URL, e.g. `http://127.0.0.1:7233`.
    pub fn new(server: &str) -> Result<Self, EngineError> {
        let base = Url::parse(server)
            .map_err(|e| EngineError::Transport(format!("invalid server url '{server}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(EngineError::Transport(format!(
                "invalid server url '{server}'"
            )));
        }

        Ok(Self {
            base,
            http: http_client()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `{base}/api/v1/{segments...}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, EngineError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| EngineError::Transport(format!("invalid server url '{}'", self.base)))?;
            path.pop_if_empty().extend(["api", "v1"]).extend(segments);
        }
        Ok(url)
    }

    async fn call(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<Value, EngineError> {
        let url = self.url(segments)?;
        tracing::debug!(%method, %url, "engine request");

        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        unwrap_envelope(status, &text)
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, EngineError> {
    serde_json::from_value(value)
        .map_err(|e| EngineError::Unavailable(format!("unexpected response payload: {e}")))
}

impl WorkflowEngine for HttpEngineClient {
    async fn start(
        &self,
        options: StartOptions,
        input: Value,
    ) -> Result<WorkflowHandle, EngineError> {
        let body = serde_json::to_value(StartRequest { options, input })
            .map_err(|e| EngineError::InvalidPayload(e.to_string()))?;
        let data = self.call(Method::POST, &["workflows"], Some(&body)).await?;
        decode(data)
    }

    async fn signal(
        &self,
        instance_key: &str,
        signal_name: &str,
        payload: Value,
    ) -> Result<(), EngineError> {
        self.call(
            Method::POST,
            &["workflows", instance_key, "signals", signal_name],
            Some(&payload),
        )
        .await?;
        Ok(())
    }

    async fn query(&self, instance_key: &str, query_name: &str) -> Result<Value, EngineError> {
        self.call(
            Method::GET,
            &["workflows", instance_key, "queries", query_name],
            None,
        )
        .await
    }

    async fn result(&self, instance_key: &str) -> Result<Value, EngineError> {
        self.call(Method::GET, &["workflows", instance_key, "result"], None)
            .await
    }
}

/// Shared reqwest client. No overall timeout: `result` long-polls until the
/// order closes.
fn http_client() -> Result<reqwest::Client, EngineError> {
    reqwest::Client::builder()
        .user_agent(concat!("brewline/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| EngineError::Transport(format!("failed to build http client: {e}")))
}
