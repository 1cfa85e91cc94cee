//! Error types for the storefront HTTP client.
//!
//! Every failure that leaves the transport is classified into an [`ApiError`].
//! Resource wrappers turn these into the uniform `{success: false, error}`
//! shape via [`ApiError::user_message`], so UI callers never match on variants.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Message shown when a request never received a response.
pub const NO_RESPONSE_MESSAGE: &str = "No response received from server";

/// Errors surfaced by the HTTP pipeline.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never reached the server (DNS, refused connection, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// TLS handshake or protocol mismatch.
    #[error("SSL error: {0}")]
    Ssl(String),

    /// HTTP 429, after the retry policy gave up.
    #[error("rate limited{}", format_retry_after(.retry_after))]
    RateLimited {
        /// Server-suggested wait, if any.
        retry_after: Option<Duration>,
        /// Parsed error body.
        body: ErrorBody,
    },

    /// HTTP 401.
    #[error("unauthenticated{}", format_detail(.body))]
    Unauthenticated {
        /// Parsed error body.
        body: ErrorBody,
    },

    /// HTTP 5xx.
    #[error("server error (HTTP {status}){}", format_detail(.body))]
    Server {
        /// Response status.
        status: StatusCode,
        /// Parsed error body.
        body: ErrorBody,
    },

    /// HTTP 4xx other than 401 and 429.
    #[error("request rejected (HTTP {status}){}", format_detail(.body))]
    Validation {
        /// Response status.
        status: StatusCode,
        /// Parsed error body.
        body: ErrorBody,
    },

    /// A successful response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The request could not be built (bad path, unserializable body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// HTTP status, for errors that carry a response.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS),
            Self::Unauthenticated { .. } => Some(StatusCode::UNAUTHORIZED),
            Self::Server { status, .. } | Self::Validation { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether no response reached the client.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Ssl(_))
    }

    /// Whether the server rate limited the request.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether the server rejected the credentials.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }

    /// The parsed error body, for errors that carry a response.
    #[must_use]
    pub const fn body(&self) -> Option<&ErrorBody> {
        match self {
            Self::RateLimited { body, .. }
            | Self::Unauthenticated { body }
            | Self::Server { body, .. }
            | Self::Validation { body, .. } => Some(body),
            _ => None,
        }
    }

    /// The message to show a user.
    ///
    /// Prefers the server's own message (or joined error list), then the
    /// no-response message for transport failures, then the error's display text.
    #[must_use]
    pub fn user_message(&self) -> String {
        if let Some(message) = self.body().and_then(ErrorBody::message) {
            return message;
        }
        if self.is_transport() {
            return NO_RESPONSE_MESSAGE.to_string();
        }
        self.to_string()
    }
}

/// A server-supplied error body.
///
/// Backends disagree on shape, so the raw JSON is kept and the message is
/// extracted from `message`, an `errors` array, or an `error` string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorBody {
    raw: Option<Value>,
}

impl ErrorBody {
    /// Parse an error body from raw response bytes.
    ///
    /// Non-JSON bodies are kept as a JSON string if they are short, readable text.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::default();
        }
        if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
            return Self { raw: Some(value) };
        }
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim();
        if text.is_empty() || text.len() > 200 || text.starts_with('<') {
            return Self::default();
        }
        Self {
            raw: Some(Value::String(text.to_string())),
        }
    }

    /// Wrap an already-parsed JSON body.
    #[must_use]
    pub const fn from_value(value: Value) -> Self {
        Self { raw: Some(value) }
    }

    /// The raw JSON body.
    #[must_use]
    pub const fn raw(&self) -> Option<&Value> {
        self.raw.as_ref()
    }

    /// The server's human-readable message, if one can be found.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self.raw.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Object(fields) => fields
                .get("message")
                .and_then(non_empty_str)
                .or_else(|| fields.get("errors").and_then(join_errors))
                .or_else(|| fields.get("error").and_then(non_empty_str)),
            _ => None,
        }
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Join an `errors` array of strings or `{msg}` / `{message}` objects.
fn join_errors(value: &Value) -> Option<String> {
    let messages: Vec<String> = value
        .as_array()?
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(fields) => fields
                .get("msg")
                .or_else(|| fields.get("message"))
                .and_then(non_empty_str),
            _ => None,
        })
        .collect();

    if messages.is_empty() {
        None
    } else {
        Some(messages.join(", "))
    }
}

fn format_detail(body: &ErrorBody) -> String {
    body.message().map_or_else(String::new, |m| format!(": {m}"))
}

#[allow(clippy::ref_option)]
fn format_retry_after(retry_after: &Option<Duration>) -> String {
    retry_after.map_or_else(String::new, |d| {
        format!(", retry after {} ms", d.as_millis())
    })
}
