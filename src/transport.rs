use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::config::ClientConfig;
use crate::error::{Error, ErrorPayload};
use crate::types::AccessToken;

/// An outbound call, kept whole so it can be replayed once after a refresh.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<JsonValue>,
}

impl PendingRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if `body` cannot be serialized.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(body).map_err(|e| Error::Encode(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    #[must_use]
    pub fn body(&self) -> Option<&JsonValue> {
        self.body.as_ref()
    }
}

/// Raw HTTP access to the backend: builds URLs, attaches the bearer
/// credential and maps response statuses onto [`Error`]. Does no retrying.
#[derive(Debug, Clone)]
pub struct Transport {
    config: ClientConfig,
    http: reqwest::Client,
}

impl Transport {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send `request` once and return the body of a 2xx response.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthorized`] on 401
    /// - [`Error::Server`] on 5xx
    /// - [`Error::Validation`] on any other non-2xx status
    /// - [`Error::Network`] when no response arrives within the timeout
    pub async fn send(
        &self,
        request: &PendingRequest,
        bearer: Option<&AccessToken>,
    ) -> Result<Vec<u8>, Error> {
        let url = self.config.endpoint(&request.path)?;

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .timeout(self.config.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(error = %e, path = %request.path, "Request failed without a response");
            Error::Network(e.to_string())
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        tracing::debug!(method = %request.method, path = %request.path, status, "Backend response");
        check_status(status, &body)?;
        Ok(body.to_vec())
    }
}

/// Map a non-2xx status onto the error taxonomy, forwarding the body verbatim.
pub(crate) fn check_status(status: u16, body: &[u8]) -> Result<(), Error> {
    match status {
        200..=299 => Ok(()),
        401 => Err(Error::Unauthorized(ErrorPayload::from_body(body))),
        500..=599 => Err(Error::Server {
            status,
            payload: ErrorPayload::from_body(body),
        }),
        _ => Err(Error::Validation {
            status,
            payload: ErrorPayload::from_body(body),
        }),
    }
}

/// Decode a success body. An empty body decodes as JSON `null`.
pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    let result = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_slice(b"null")
    } else {
        serde_json::from_slice(body)
    };
    result.map_err(|e| Error::Decode(e.to_string()))
}
