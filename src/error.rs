use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Errors signaled to callers of the session core.
///
/// `Clone` so a single refresh outcome can be handed to every caller
/// waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// 401 after a failed or skipped refresh.
    #[error("Unauthorized: {0}")]
    Unauthorized(ErrorPayload),

    /// 4xx other than 401. The payload usually carries per-field messages.
    #[error("Request rejected ({status}): {payload}")]
    Validation { status: u16, payload: ErrorPayload },

    /// 5xx from the backend.
    #[error("Server error ({status}): {payload}")]
    Server { status: u16, payload: ErrorPayload },

    /// No response received (connection failure or timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// Refresh failed; the session was torn down.
    #[error("Session expired")]
    SessionExpired,

    /// Login rejected or incomplete. Carries the message shown to the user.
    #[error("{0}")]
    Login(String),

    /// A request body that could not be serialized.
    #[error("Could not encode request body: {0}")]
    Encode(String),

    /// A success response whose body did not match the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Backend payload attached to this error, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            Self::Unauthorized(payload)
            | Self::Validation { payload, .. }
            | Self::Server { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// HTTP status carried by this error, if it came from a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::Validation { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Error body returned by the backend, kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorPayload(JsonValue);

/// A validation message bound to a form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Option<String>,
    pub message: String,
}

impl ErrorPayload {
    /// Wrap a raw response body. Non-JSON bodies are kept as a JSON string.
    #[must_use]
    pub fn from_body(body: &[u8]) -> Self {
        if body.is_empty() {
            return Self(JsonValue::Null);
        }
        match serde_json::from_slice(body) {
            Ok(value) => Self(value),
            Err(_) => Self(JsonValue::String(String::from_utf8_lossy(body).into_owned())),
        }
    }

    #[must_use]
    pub fn as_json(&self) -> &JsonValue {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }

    /// Human-readable message taken from the body.
    ///
    /// Precedence: `errors[]` entries joined by `", "`, then `err`, then
    /// `message`, then a bare string body.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        let fields = self.field_errors();
        if !fields.is_empty() {
            let joined = fields
                .iter()
                .map(|f| f.message.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Some(joined);
        }
        if let Some(msg) = self.get_str("err").or_else(|| self.get_str("message")) {
            return Some(msg.to_owned());
        }
        match &self.0 {
            JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    /// Non-empty string under a top-level `key`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Per-field messages from an `errors` array.
    #[must_use]
    pub fn field_errors(&self) -> Vec<FieldError> {
        let Some(entries) = self.0.get("errors").and_then(JsonValue::as_array) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| {
                let message = ["message", "msg"]
                    .iter()
                    .find_map(|k| entry.get(*k).and_then(JsonValue::as_str))?
                    .to_owned();
                let field = ["path", "param", "field"]
                    .iter()
                    .find_map(|k| entry.get(*k).and_then(JsonValue::as_str))
                    .map(str::to_owned);
                Some(FieldError { field, message })
            })
            .collect()
    }
}

impl From<JsonValue> for ErrorPayload {
    fn from(value: JsonValue) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.message() {
            Some(msg) => f.write_str(&msg),
            None if self.is_empty() => f.write_str("no details"),
            None => write!(f, "{}", self.0),
        }
    }
}
