//! Request decoration stages.
//!
//! Each stage takes the request by value and returns the decorated request.
//! Stages run in the order they were pushed.

use std::fmt;
use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderValue};

use crate::session::SessionStore;
use crate::transport::{APPLICATION_JSON, ApiRequest, RequestBody};

/// A single request stage.
pub type RequestStage = Arc<dyn Fn(ApiRequest) -> ApiRequest + Send + Sync>;

/// Ordered list of request stages.
#[derive(Clone, Default)]
pub struct RequestPipeline {
    stages: Vec<(&'static str, RequestStage)>,
}

impl RequestPipeline {
    /// An empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The default stages: accept header, bearer auth, content type, body encoding.
    #[must_use]
    pub fn standard(store: SessionStore) -> Self {
        Self::new()
            .with_stage("accept_json", accept_json())
            .with_stage("bearer_auth", bearer_auth(store))
            .with_stage("normalize_content_type", normalize_content_type())
            .with_stage("encode_json_body", encode_json_body())
    }

    /// Append a stage.
    #[must_use]
    pub fn with_stage(mut self, name: &'static str, stage: RequestStage) -> Self {
        self.stages.push((name, stage));
        self
    }

    /// Stage names, in order.
    pub fn stage_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|(name, _)| *name)
    }

    /// Run every stage over the request.
    #[must_use]
    pub fn apply(&self, request: ApiRequest) -> ApiRequest {
        self.stages
            .iter()
            .fold(request, |request, (_, stage)| stage(request))
    }
}

impl fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}

// =============================================================================
// Stages
// =============================================================================

/// Ask for JSON unless the caller asked for something else.
#[must_use]
pub fn accept_json() -> RequestStage {
    Arc::new(|mut request: ApiRequest| {
        if !request.headers.contains_key(ACCEPT) {
            request
                .headers
                .insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        }
        request
    })
}

/// Attach the session's bearer token, read fresh on every request.
#[must_use]
pub fn bearer_auth(store: SessionStore) -> RequestStage {
    Arc::new(move |mut request: ApiRequest| {
        if let Some(token) = store.token() {
            // BearerToken::parse guarantees header-safe characters
            if let Ok(mut value) = HeaderValue::from_str(&token.authorization_value()) {
                value.set_sensitive(true);
                request.headers.insert(AUTHORIZATION, value);
            }
        }
        request
    })
}

/// Default body-carrying requests to JSON; never touch an explicit type.
#[must_use]
pub fn normalize_content_type() -> RequestStage {
    Arc::new(|mut request: ApiRequest| {
        if request.is_mutating()
            && !request.body.is_empty()
            && !request.headers.contains_key(CONTENT_TYPE)
            && !request.body.is_multipart()
        {
            request
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        }
        request
    })
}

/// Serialize object bodies to JSON text when the content type is JSON.
///
/// Objects under any other content type pass through untouched.
#[must_use]
pub fn encode_json_body() -> RequestStage {
    Arc::new(|mut request: ApiRequest| {
        if request.is_json() {
            if let RequestBody::Object(value) = &request.body {
                request.body = RequestBody::Text(value.to_string());
            }
        }
        request
    })
}
