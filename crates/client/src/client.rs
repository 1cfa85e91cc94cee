//! The shared HTTP client every resource wrapper funnels through.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use storefront_client_core::ApiResponse;
use tracing::instrument;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::navigation::Navigator;
use crate::pipeline::{RequestPipeline, ResponsePipeline};
use crate::session::SessionStore;
use crate::transport::{ApiReply, ApiRequest, ReqwestTransport, Transport};

/// Storefront HTTP client.
///
/// Requests pass through the request pipeline (auth, content type, body
/// encoding), are executed by the transport, and settle through the response
/// pipeline (classification, 429 retries, session invalidation, logging).
///
/// Cloning is cheap; clones share the transport, pipelines and session.
pub struct HttpClient<T = ReqwestTransport> {
    inner: Arc<HttpClientInner<T>>,
}

struct HttpClientInner<T> {
    transport: T,
    requests: RequestPipeline,
    responses: ResponsePipeline,
    session: SessionStore,
    config: ClientConfig,
}

impl<T> Clone for HttpClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl HttpClient<ReqwestTransport> {
    /// Create a client backed by `reqwest` with the standard pipelines.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(config: ClientConfig, session: SessionStore, navigator: Arc<dyn Navigator>) -> Self {
        let transport = ReqwestTransport::new(&config);
        Self::with_transport(transport, config, session, navigator)
    }
}

impl<T: Transport> HttpClient<T> {
    /// Create a client over a custom transport with the standard pipelines.
    #[must_use]
    pub fn with_transport(
        transport: T,
        config: ClientConfig,
        session: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let requests = RequestPipeline::standard(session.clone());
        let responses =
            ResponsePipeline::standard(config.retry, session.clone(), navigator, config.routes.clone());
        Self::with_pipelines(transport, config, session, requests, responses)
    }

    /// Create a client with explicit pipelines.
    #[must_use]
    pub fn with_pipelines(
        transport: T,
        config: ClientConfig,
        session: SessionStore,
        requests: RequestPipeline,
        responses: ResponsePipeline,
    ) -> Self {
        Self {
            inner: Arc::new(HttpClientInner {
                transport,
                requests,
                responses,
                session,
                config,
            }),
        }
    }

    /// The session store shared with the pipelines.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Send a request through both pipelines.
    ///
    /// # Errors
    ///
    /// Returns the classified `ApiError` if the request ultimately failed.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiReply, ApiError> {
        let prepared = self.inner.requests.apply(request);
        self.inner.responses.run(&self.inner.transport, &prepared).await
    }

    /// Send a request and decode its payload.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request failed or the payload did not decode.
    pub async fn fetch<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R, ApiError> {
        self.send(request).await?.decode()
    }

    /// Send a request and wrap the outcome in the uniform response shape.
    pub async fn call<R: DeserializeOwned>(&self, request: ApiRequest) -> ApiResponse<R> {
        into_response(self.fetch(request).await)
    }

    /// `GET` and decode.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request failed or the payload did not decode.
    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.fetch(ApiRequest::get(path)).await
    }

    /// `POST` a JSON body and decode.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request failed or the payload did not decode.
    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        self.fetch(ApiRequest::post(path).json(body)?).await
    }

    /// `PUT` a JSON body and decode.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request failed or the payload did not decode.
    pub async fn put<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        self.fetch(ApiRequest::put(path).json(body)?).await
    }

    /// `PATCH` a JSON body and decode.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request failed or the payload did not decode.
    pub async fn patch<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        self.fetch(ApiRequest::patch(path).json(body)?).await
    }

    /// `DELETE` and decode.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request failed or the payload did not decode.
    pub async fn delete<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.fetch(ApiRequest::delete(path)).await
    }
}

impl<T> fmt::Debug for HttpClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("requests", &self.inner.requests)
            .field("responses", &self.inner.responses)
            .finish_non_exhaustive()
    }
}

/// Convert a pipeline result into the uniform response shape.
pub fn into_response<R>(result: Result<R, ApiError>) -> ApiResponse<R> {
    match result {
        Ok(data) => ApiResponse::ok(data),
        Err(e) => ApiResponse::failure(e.user_message()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
    use serde_json::{Value, json};
    use storefront_client_core::BearerToken;
    use url::Url;

    use super::*;
    use crate::navigation::MemoryNavigator;
    use crate::testing::ScriptedTransport;
    use crate::transport::RequestBody;

    fn client(transport: ScriptedTransport) -> HttpClient<ScriptedTransport> {
        let config = ClientConfig::new(Url::parse("http://localhost:5000/api/").unwrap());
        HttpClient::with_transport(
            transport,
            config,
            SessionStore::in_memory(),
            Arc::new(MemoryNavigator::new("/")),
        )
    }

    #[tokio::test]
    async fn test_post_decorates_request() {
        let client = client(ScriptedTransport::json([(201, json!({"data": {"ok": true}}))]));
        client
            .session()
            .set(BearerToken::parse("tok").unwrap(), None);

        let reply: Value = client.post("cart/items", &json!({"productId": "p1"})).await.unwrap();
        assert_eq!(reply, json!({"ok": true}));

        let sent = &client.transport().requests()[0];
        assert_eq!(sent.headers[AUTHORIZATION], "Bearer tok");
        assert_eq!(sent.headers[CONTENT_TYPE], "application/json");
        assert!(matches!(sent.body, RequestBody::Text(_)));
    }

    #[tokio::test]
    async fn test_call_reports_server_message() {
        let client = client(ScriptedTransport::json([(
            400,
            json!({"errors": [{"msg": "Quantity must be positive"}]}),
        )]));
        let response: ApiResponse<Value> = client.call(ApiRequest::get("cart")).await;
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Quantity must be positive"));
    }

    #[tokio::test]
    async fn test_call_reports_no_response() {
        let client = client(ScriptedTransport::default());
        let response: ApiResponse<Value> = client.call(ApiRequest::get("cart")).await;
        assert_eq!(response.error.as_deref(), Some(crate::error::NO_RESPONSE_MESSAGE));
    }

    #[tokio::test]
    async fn test_decode_failure_is_reported() {
        let client = client(ScriptedTransport::json([(200, json!({"data": "not a number"}))]));
        let result: Result<u32, ApiError> = client.get("cart").await;
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }
}
