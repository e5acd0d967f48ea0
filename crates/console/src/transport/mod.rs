//! Resilient HTTP transport.
//!
//! Wraps `reqwest` with the console's conventions:
//! - mutating requests carry the anti-forgery token read fresh from the jar
//! - each request declares whether its reply is enveloped or raw
//! - a 403 caused by a stale anti-forgery token is recovered once, by
//!   refreshing the token and resending a rebuilt copy of the request

pub mod csrf;
pub mod envelope;
mod error;

use std::sync::Arc;

use reqwest::Method;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::ConsoleConfig;

pub use csrf::{RetryBudget, XSRF_COOKIE, XSRF_HEADER};
pub use envelope::Envelope;
pub use error::ApiError;

/// Declared shape of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{success, code, message, data}`.
    Envelope,
    /// Anything else (files, redirects, bootstrap endpoints).
    Raw,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// One logical API call. Cloned (rebuilt) for the anti-forgery retry.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    pub shape: ResponseShape,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            shape: ResponseShape::Envelope,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn raw(mut self) -> Self {
        self.shape = ResponseShape::Raw;
        self
    }
}

/// Response passed through without interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Reply decoded according to the request's declared shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Envelope(Option<Value>),
    Raw(RawResponse),
}

#[derive(Clone)]
pub struct Transport {
    client: reqwest::Client,
    jar: Arc<Jar>,
    base_url: Url,
    csrf_path: String,
}

impl Transport {
    pub fn new(config: &ConsoleConfig) -> Result<Self, ApiError> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            // login answers with a redirect that counts as success
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            jar,
            base_url: config.base_url.clone(),
            csrf_path: config.endpoints.csrf.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Token currently held in the cookie jar.
    pub fn csrf_token(&self) -> Option<String> {
        csrf::read_token(self.jar.as_ref(), &self.base_url)
    }

    /// Ask the server to (re)issue the anti-forgery cookie.
    ///
    /// Called once at start-up and by the recovery path; never retried.
    pub async fn bootstrap_csrf(&self) -> Result<(), ApiError> {
        let request = ApiRequest::get(self.csrf_path.clone()).raw();
        let response = self.send_once(&request).await?;
        check_status(&request, response)?;
        tracing::debug!(has_token = self.csrf_token().is_some(), "anti-forgery token bootstrapped");
        Ok(())
    }

    /// Send a request and decode it according to its declared shape.
    pub async fn request(&self, request: &ApiRequest) -> Result<Reply, ApiError> {
        let response = self.execute(request, RetryBudget::fresh()).await?;
        match request.shape {
            ResponseShape::Raw => Ok(Reply::Raw(response)),
            ResponseShape::Envelope => {
                let data = envelope::decode::<Value>(&response.body)?.into_result()?;
                Ok(Reply::Envelope(data))
            }
        }
    }

    /// Enveloped call with typed `data`.
    pub async fn enveloped<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<Option<T>, ApiError> {
        let response = self.execute(request, RetryBudget::fresh()).await?;
        envelope::decode::<T>(&response.body)?.into_result()
    }

    /// Raw call; the status has already been checked.
    pub async fn raw(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        self.execute(request, RetryBudget::fresh()).await
    }

    async fn execute(
        &self,
        request: &ApiRequest,
        mut budget: RetryBudget,
    ) -> Result<RawResponse, ApiError> {
        loop {
            let response = self.send_once(request).await?;

            if response.status == 403 && csrf::is_anti_forgery_failure(&response.body) {
                if budget.take() {
                    tracing::warn!(
                        method = %request.method,
                        path = %request.path,
                        "anti-forgery token rejected, refreshing and retrying once"
                    );
                    self.bootstrap_csrf().await?;
                    continue;
                }
                tracing::warn!(
                    method = %request.method,
                    path = %request.path,
                    "anti-forgery token rejected again after refresh"
                );
            }

            if budget.is_retry() {
                tracing::debug!(path = %request.path, status = response.status, "retried request completed");
            }
            return check_status(request, response);
        }
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        let url = self
            .base_url
            .join(&request.path)
            .map_err(|e| ApiError::Transport(format!("invalid path '{}': {e}", request.path)))?;

        let mut builder = self.client.request(request.method.clone(), url);

        if csrf::is_mutating(&request.method) {
            if let Some(token) = self.csrf_token() {
                builder = builder.header(XSRF_HEADER, token);
            }
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(fields) => builder.form(fields),
        };

        let response = builder.send().await.map_err(|e| {
            tracing::error!(method = %request.method, path = %request.path, error = %e, "request failed");
            ApiError::from(e)
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v: &HeaderValue| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(ApiError::from)?.to_vec();

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url.as_str())
            .field("csrf_path", &self.csrf_path)
            .finish()
    }
}

/// Map a non-success status to the error taxonomy. 2xx and 3xx pass.
fn check_status(request: &ApiRequest, response: RawResponse) -> Result<RawResponse, ApiError> {
    if (200..400).contains(&response.status) {
        return Ok(response);
    }

    let (code, message) = envelope::describe_error_body(&response.body);
    tracing::debug!(
        method = %request.method,
        path = %request.path,
        status = response.status,
        code = code.as_deref().unwrap_or(""),
        "request rejected"
    );

    match response.status {
        401 | 403 => Err(ApiError::Auth {
            status: response.status,
            code,
            message,
        }),
        status => Err(ApiError::Status { status, message }),
    }
}
