//! Failure classification, retries, and response stages.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use reqwest::StatusCode;
use storefront_client_core::AuthRoutes;
use tracing::{debug, error, warn};

use crate::error::{ApiError, ErrorBody};
use crate::navigation::Navigator;
use crate::retry::{RateLimitHint, RequestAttempt, RetryDecision, RetryPolicy};
use crate::session::SessionStore;
use crate::transport::{ApiReply, ApiRequest, Transport, TransportError};

/// Observes the settled result of a request. Stages cannot alter the result.
pub type ResponseStage = Arc<dyn Fn(&ApiRequest, &Result<ApiReply, ApiError>) + Send + Sync>;

/// Executes a prepared request, retrying rate-limited attempts, then runs
/// response stages over the final result.
#[derive(Clone)]
pub struct ResponsePipeline {
    policy: RetryPolicy,
    stages: Vec<(&'static str, ResponseStage)>,
}

impl ResponsePipeline {
    /// A pipeline with no stages.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            stages: Vec::new(),
        }
    }

    /// The default stages: session invalidation on 401, then failure logging.
    #[must_use]
    pub fn standard(
        policy: RetryPolicy,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
        routes: AuthRoutes,
    ) -> Self {
        Self::new(policy)
            .with_stage(
                "invalidate_on_unauthenticated",
                invalidate_on_unauthenticated(store, navigator, routes),
            )
            .with_stage("log_failures", log_failures())
    }

    /// Append a stage.
    #[must_use]
    pub fn with_stage(mut self, name: &'static str, stage: ResponseStage) -> Self {
        self.stages.push((name, stage));
        self
    }

    /// Stage names, in order.
    pub fn stage_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|(name, _)| *name)
    }

    /// The retry policy in use.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `request`, retrying on 429 while the policy permits.
    ///
    /// The same prepared request is re-issued on every retry. Transport
    /// failures and every status other than 429 settle immediately.
    ///
    /// # Errors
    ///
    /// Returns the classified `ApiError` of the last attempt.
    pub async fn run<T: Transport>(
        &self,
        transport: &T,
        request: &ApiRequest,
    ) -> Result<ApiReply, ApiError> {
        let mut attempt = RequestAttempt::new();

        let result = loop {
            let (retry_after, body) = match classify(transport.execute(request).await) {
                Err(ApiError::RateLimited { retry_after, body }) => (retry_after, body),
                settled => break settled,
            };

            let hint = retry_after.map(RateLimitHint::new);
            match self.policy.decide(&attempt, hint) {
                RetryDecision::Retry { delay } => {
                    attempt = attempt.schedule_retry();
                    warn!(
                        request_id = %attempt.id,
                        path = %request.path,
                        retry = attempt.retry_count,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Rate limited, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.dispatched();
                }
                RetryDecision::GiveUp(reason) => {
                    debug!(
                        request_id = %attempt.id,
                        path = %request.path,
                        retries = attempt.retry_count,
                        ?reason,
                        "Not retrying rate-limited request"
                    );
                    break Err(ApiError::RateLimited { retry_after, body });
                }
            }
        };

        for (_, stage) in &self.stages {
            stage(request, &result);
        }
        result
    }
}

impl fmt::Debug for ResponsePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponsePipeline")
            .field("policy", &self.policy)
            .field("stages", &self.stage_names().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Classify a transport outcome.
///
/// Transport failures come first (no response means nothing else applies),
/// then 429, then 401, then 5xx and remaining 4xx.
pub fn classify(outcome: Result<ApiReply, TransportError>) -> Result<ApiReply, ApiError> {
    let reply = match outcome {
        Ok(reply) => reply,
        Err(TransportError::Tls(detail)) => return Err(ApiError::Ssl(detail)),
        Err(e) => return Err(ApiError::Network(e.to_string())),
    };

    let status = reply.status;
    if !(status.is_client_error() || status.is_server_error()) {
        return Ok(reply);
    }

    let body = ErrorBody::from_bytes(&reply.body);
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let hint = RateLimitHint::from_response(&reply.headers, body.raw(), Utc::now());
            ApiError::RateLimited {
                retry_after: hint.map(|h| h.retry_after),
                body,
            }
        }
        StatusCode::UNAUTHORIZED => ApiError::Unauthenticated { body },
        s if s.is_server_error() => ApiError::Server { status: s, body },
        s => ApiError::Validation { status: s, body },
    })
}

// =============================================================================
// Stages
// =============================================================================

/// On 401 outside the login/registration routes, drop the session and
/// replace-navigate to the login route.
///
/// After the redirect the current route is the login route, so concurrent
/// 401s settle without redirecting again.
#[must_use]
pub fn invalidate_on_unauthenticated(
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    routes: AuthRoutes,
) -> ResponseStage {
    Arc::new(move |request: &ApiRequest, result: &Result<ApiReply, ApiError>| {
        if !matches!(result, Err(ApiError::Unauthenticated { .. })) {
            return;
        }
        let current = navigator.current_path();
        if routes.is_auth_route(&current) {
            debug!(path = %request.path, route = %current, "Unauthenticated on auth route, keeping session");
            return;
        }
        warn!(path = %request.path, route = %current, "Session rejected by server, signing out");
        store.clear();
        navigator.replace(&routes.login);
    })
}

/// Log every failure at a level matching its severity.
#[must_use]
pub fn log_failures() -> ResponseStage {
    Arc::new(|request: &ApiRequest, result: &Result<ApiReply, ApiError>| {
        let Err(err) = result else {
            return;
        };
        let method = &request.method;
        let path = &request.path;
        match err {
            ApiError::Network(_) | ApiError::Ssl(_) => {
                error!(%method, %path, error = %err, "No response received from server");
            }
            ApiError::Server { status, .. } => {
                error!(%method, %path, status = status.as_u16(), error = %err, "Server error");
            }
            ApiError::RateLimited { .. } => {
                warn!(%method, %path, error = %err, "Rate limit retries exhausted");
            }
            ApiError::Unauthenticated { .. }
            | ApiError::Validation { .. }
            | ApiError::Decode(_)
            | ApiError::InvalidRequest(_) => {
                debug!(%method, %path, error = %err, "Request failed");
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use reqwest::header::HeaderMap;
    use storefront_client_core::BearerToken;

    use super::*;
    use crate::navigation::MemoryNavigator;
    use crate::testing::ScriptedTransport;

    fn reply(status: u16, body: &str) -> Result<ApiReply, TransportError> {
        Ok(ApiReply::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            body.as_bytes().to_vec(),
        ))
    }

    #[test]
    fn test_classify_precedence() {
        assert!(classify(reply(200, "{}")).is_ok());
        assert!(classify(reply(204, "")).is_ok());
        assert!(matches!(
            classify(Err(TransportError::Tls("bad cert".into()))),
            Err(ApiError::Ssl(_))
        ));
        assert!(matches!(
            classify(Err(TransportError::Timeout("30s".into()))),
            Err(ApiError::Network(_))
        ));
        assert!(matches!(classify(reply(429, "")), Err(ApiError::RateLimited { .. })));
        assert!(matches!(classify(reply(401, "")), Err(ApiError::Unauthenticated { .. })));
        assert!(matches!(classify(reply(503, "")), Err(ApiError::Server { .. })));
        assert!(matches!(classify(reply(422, "")), Err(ApiError::Validation { .. })));
    }

    #[test]
    fn test_classify_reads_body_hint() {
        let err = classify(reply(429, r#"{"retryAfter": 5}"#)).unwrap_err();
        let ApiError::RateLimited { retry_after, .. } = err else {
            panic!("expected rate limit, got {err:?}");
        };
        assert_eq!(retry_after, Some(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let transport = ScriptedTransport::new([reply(429, ""), reply(429, ""), reply(200, "{}")]);
        let pipeline = ResponsePipeline::new(RetryPolicy::default());
        let start = tokio::time::Instant::now();

        let result = pipeline.run(&transport, &ApiRequest::get("cart")).await;

        assert!(result.is_ok());
        assert_eq!(transport.request_count(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(1000 + 2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_retries() {
        let transport = ScriptedTransport::new((0..5).map(|_| reply(429, "")));
        let pipeline = ResponsePipeline::new(RetryPolicy::default());
        let start = tokio::time::Instant::now();

        let result = pipeline.run(&transport, &ApiRequest::get("cart")).await;

        assert!(matches!(result, Err(ApiError::RateLimited { .. })));
        assert_eq!(transport.request_count(), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(1000 + 2000 + 4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_are_not_retried() {
        let transport = ScriptedTransport::new([reply(500, ""), reply(200, "{}")]);
        let pipeline = ResponsePipeline::new(RetryPolicy::default());
        let result = pipeline.run(&transport, &ApiRequest::get("cart")).await;
        assert!(matches!(result, Err(ApiError::Server { .. })));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_stages_observe_final_result() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let pipeline = ResponsePipeline::new(RetryPolicy::default()).with_stage(
            "count",
            Arc::new(move |_: &ApiRequest, result: &Result<ApiReply, ApiError>| {
                if result.is_err() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );
        let transport = ScriptedTransport::new([reply(404, "")]);
        let _ = pipeline.run(&transport, &ApiRequest::get("x")).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    fn signed_in_store() -> SessionStore {
        let store = SessionStore::in_memory();
        store.set(BearerToken::parse("t").unwrap(), None);
        store
    }

    #[test]
    fn test_unauthenticated_redirects_once_outside_auth_routes() {
        let store = signed_in_store();
        let navigator = Arc::new(MemoryNavigator::new("/orders"));
        let stage =
            invalidate_on_unauthenticated(store.clone(), navigator.clone(), AuthRoutes::default());
        let failure = Err(ApiError::Unauthenticated {
            body: ErrorBody::default(),
        });

        stage(&ApiRequest::get("orders"), &failure);
        stage(&ApiRequest::get("cart"), &failure);

        assert!(!store.is_authenticated());
        assert_eq!(navigator.current_path(), "/login");
        assert_eq!(navigator.redirects(), 1);
    }

    #[test]
    fn test_unauthenticated_on_login_route_keeps_session() {
        let store = signed_in_store();
        let navigator = Arc::new(MemoryNavigator::new("/login?next=/cart"));
        let stage =
            invalidate_on_unauthenticated(store.clone(), navigator.clone(), AuthRoutes::default());

        stage(
            &ApiRequest::post("auth/login"),
            &Err(ApiError::Unauthenticated {
                body: ErrorBody::default(),
            }),
        );

        assert!(store.is_authenticated());
        assert_eq!(navigator.redirects(), 0);
    }

    #[test]
    fn test_other_failures_do_not_invalidate() {
        let store = signed_in_store();
        let navigator = Arc::new(MemoryNavigator::new("/orders"));
        let stage =
            invalidate_on_unauthenticated(store.clone(), navigator.clone(), AuthRoutes::default());

        stage(&ApiRequest::get("orders"), &Err(ApiError::Network("refused".into())));
        stage(
            &ApiRequest::get("orders"),
            &Err(ApiError::Server {
                status: StatusCode::BAD_GATEWAY,
                body: ErrorBody::default(),
            }),
        );

        assert!(store.is_authenticated());
        assert_eq!(navigator.redirects(), 0);
    }
}
