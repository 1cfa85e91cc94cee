//! Request/response types and the transport that executes them.
//!
//! The pipelines operate on [`ApiRequest`] values; a [`Transport`] turns a
//! fully decorated request into an [`ApiReply`]. Production code uses
//! [`ReqwestTransport`]; tests substitute scripted transports.

use std::error::Error as StdError;
use std::future::Future;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::ClientConfig;
use crate::error::ApiError;

/// JSON media type.
pub const APPLICATION_JSON: &str = "application/json";
/// Multipart media type (the transport appends the boundary).
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
/// URL-encoded form media type.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

// =============================================================================
// Request
// =============================================================================

/// Body of an outgoing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// A plain object, serialized according to the effective content type.
    Object(Value),
    /// Pre-encoded text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Multipart form (file uploads).
    Multipart(MultipartForm),
}

impl RequestBody {
    /// Whether there is no body.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Whether the body is a multipart form.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }
}

/// A multipart form that can be rebuilt for every retry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

/// One field of a [`MultipartForm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    /// Field name.
    pub name: String,
    /// Field contents.
    pub value: FormValue,
}

/// Contents of a multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    /// Plain text field.
    Text(String),
    /// File upload.
    File {
        /// File name sent to the server.
        file_name: String,
        /// MIME type, if known.
        content_type: Option<String>,
        /// File contents.
        bytes: Vec<u8>,
    },
}

impl MultipartForm {
    /// Create an empty form.
    #[must_use]
    pub const fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Add a text field.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::Text(value.into()),
        });
        self
    }

    /// Add a file field.
    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::File {
                file_name: file_name.into(),
                content_type,
                bytes,
            },
        });
        self
    }

    /// The form's fields.
    #[must_use]
    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Build a `reqwest` form. Forms are not `Clone`, so this runs per attempt.
    fn to_reqwest(&self) -> Result<reqwest::multipart::Form, TransportError> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match &part.value {
                FormValue::Text(text) => form.text(part.name.clone(), text.clone()),
                FormValue::File {
                    file_name,
                    content_type,
                    bytes,
                } => {
                    let mut file = reqwest::multipart::Part::bytes(bytes.clone())
                        .file_name(file_name.clone());
                    if let Some(mime) = content_type {
                        file = file
                            .mime_str(mime)
                            .map_err(|e| TransportError::Request(e.to_string()))?;
                    }
                    form.part(part.name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

/// An outgoing request, relative to the client's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the base URL (leading `/` is ignored).
    pub path: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: RequestBody,
}

impl ApiRequest {
    /// Create a request with no body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST` request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT` request.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `PATCH` request.
    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// `DELETE` request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set a plain-object body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidRequest` if the value cannot be serialized.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.body = RequestBody::Object(value);
        Ok(self)
    }

    /// Set a multipart body and mark the request as multipart.
    #[must_use]
    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(MULTIPART_FORM_DATA));
        self.body = RequestBody::Multipart(form);
        self
    }

    /// Set a header, replacing any existing value.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// The explicit content type, if set.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Whether the effective content type is JSON (`application/json` or `+json`).
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type().is_some_and(is_json_media_type)
    }

    /// Whether the method carries a body by convention.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH)
    }
}

/// Whether a `Content-Type` value names a JSON media type.
#[must_use]
pub fn is_json_media_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == APPLICATION_JSON || essence.ends_with("+json")
}

// =============================================================================
// Reply
// =============================================================================

/// A response that reached the client, successful or not.
#[derive(Debug, Clone)]
pub struct ApiReply {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw body.
    pub body: Vec<u8>,
}

impl ApiReply {
    /// Create a reply.
    #[must_use]
    pub const fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// The body as JSON, if it parses.
    #[must_use]
    pub fn json_value(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    /// Decode the payload, unwrapping a `{"data": ...}` envelope if present.
    ///
    /// An empty body decodes as JSON `null`, so `()` and `Option<T>` payloads
    /// work for `204 No Content`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Decode` if the body is not valid JSON of the expected shape.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let value = if self.body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice::<Value>(&self.body)
                .map_err(|e| ApiError::Decode(e.to_string()))?
        };
        let payload = match value {
            Value::Object(mut fields) if fields.contains_key("data") => {
                fields.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(payload).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Failures where no response reached the client.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Could not connect (DNS, refused, reset).
    #[error("connection failed: {0}")]
    Connect(String),
    /// TLS handshake or certificate failure.
    #[error("TLS failure: {0}")]
    Tls(String),
    /// The request timed out.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// The request could not be built or sent.
    #[error("request failed: {0}")]
    Request(String),
}

/// Executes decorated requests.
pub trait Transport: Send + Sync + 'static {
    /// Send the request and collect the full response.
    fn execute(
        &self,
        request: &ApiRequest,
    ) -> impl Future<Output = Result<ApiReply, TransportError>> + Send;
}

/// `reqwest`-backed transport with a cookie store.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Create a transport for the configured backend.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.clone(),
        }
    }

    /// Resolve a request path and its query parameters against the base URL.
    fn url_for(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let path = &request.path;
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::Request(format!("invalid path {path:?}: {e}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

impl Transport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiReply, TransportError> {
        let url = self.url_for(request)?;

        let mut headers = request.headers.clone();
        let mut builder = self.client.request(request.method.clone(), url);

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Text(text) => builder.body(text.clone()),
            RequestBody::Bytes(bytes) => builder.body(bytes.clone()),
            RequestBody::Object(value) => {
                let is_form = request
                    .content_type()
                    .is_some_and(|ct| ct.starts_with(FORM_URLENCODED));
                if is_form {
                    builder.form(value)
                } else {
                    let bytes = serde_json::to_vec(value)
                        .map_err(|e| TransportError::Request(e.to_string()))?;
                    builder.body(bytes)
                }
            }
            RequestBody::Multipart(form) => {
                // reqwest sets the boundary-bearing content type itself
                headers.remove(CONTENT_TYPE);
                builder.multipart(form.to_reqwest()?)
            }
        };

        let response = builder
            .headers(headers)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify_reqwest_error)?;

        Ok(ApiReply::new(status, headers, body.to_vec()))
    }
}

/// Map a `reqwest` error to a transport failure kind.
fn classify_reqwest_error(error: reqwest::Error) -> TransportError {
    let detail = error_chain(&error);
    if error.is_timeout() {
        TransportError::Timeout(detail)
    } else if looks_like_tls(&detail) {
        TransportError::Tls(detail)
    } else if error.is_connect() {
        TransportError::Connect(detail)
    } else {
        TransportError::Request(detail)
    }
}

/// Render an error and all of its sources.
fn error_chain(error: &dyn StdError) -> String {
    let mut detail = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        detail.push_str(": ");
        detail.push_str(&inner.to_string());
        source = inner.source();
    }
    detail
}

fn looks_like_tls(detail: &str) -> bool {
    let lower = detail.to_ascii_lowercase();
    ["tls", "ssl", "certificate", "handshake"]
        .iter()
        .any(|needle| lower.contains(needle))
}
